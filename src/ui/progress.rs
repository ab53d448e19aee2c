//! Progress indicators for long-running operations
//!
//! Uses `linya` for allocation-free progress bars. Bars are only drawn when
//! stderr is a terminal, so piped and CI output stays clean.

use linya::{Bar, Progress};
use std::io::IsTerminal;

/// Progress over a batch of ingested changes
pub struct IngestProgress {
  inner: Option<(Progress, Bar)>,
}

impl IngestProgress {
  /// Create a bar for `total` items; a no-op when not attached to a terminal
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let inner = if total > 0 && std::io::stderr().is_terminal() {
      let mut progress = Progress::new();
      let bar = progress.bar(total, label.into());
      Some((progress, bar))
    } else {
      None
    };
    Self { inner }
  }

  /// Increment progress by 1
  pub fn inc(&mut self) {
    if let Some((progress, bar)) = &mut self.inner {
      progress.inc_and_draw(bar, 1);
    }
  }

  pub fn is_drawing(&self) -> bool {
    self.inner.is_some()
  }
}
