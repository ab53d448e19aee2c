//! Stateless previews: `shiprail next-version` and `shiprail changelog`
//!
//! Nothing here touches `.shiprail/`; the inputs are given on the command line.

use crate::commands::classify::{classify_all, rejection};
use crate::core::context::WorkspaceContext;
use crate::core::error::ShipResult;
use crate::release::classifier::{BatchOutcome, ChangeDescriptor};
use crate::release::version::{SemanticVersion, next_version};
use crate::ui::output::{OutputFormat, print_output};
use serde::Serialize;
use std::fmt::{self, Write};

#[derive(Debug, Serialize)]
struct NextVersionReport {
  current: SemanticVersion,
  next: SemanticVersion,
  bump: bool,
  changes: usize,
  skipped: usize,
}

#[derive(Debug, Serialize)]
struct ChangelogPreview {
  version: SemanticVersion,
  changelog: String,
}

/// Classify `changes`, skipping rejected ones with a warning
fn accepted_changes(ctx: &WorkspaceContext, changes: Vec<String>) -> (Vec<ChangeDescriptor>, usize) {
  let items = classify_all(&ctx.config.classifier(), changes);
  let mut accepted = Vec::new();
  let mut skipped = 0;
  for item in &items {
    match &item.outcome {
      BatchOutcome::Classified(classification) => accepted.push(classification.descriptor.clone()),
      BatchOutcome::Rejected { .. } => {
        if let Some(err) = rejection(item) {
          tracing::warn!(input = %err.input, reason = %err.reason, "skipping unclassifiable change");
        }
        skipped += 1;
      }
    }
  }
  (accepted, skipped)
}

/// Print the version the given changes would produce
pub fn run_next_version(
  ctx: &WorkspaceContext,
  current: String,
  changes: Vec<String>,
  format: OutputFormat,
) -> ShipResult<()> {
  let current = SemanticVersion::parse(&current)?;
  let policy = ctx.config.bump_policy()?;
  let (accepted, skipped) = accepted_changes(ctx, changes);
  let next = next_version(current, &accepted, &policy)?;

  let report = NextVersionReport {
    current,
    next,
    bump: next != current,
    changes: accepted.len(),
    skipped,
  };
  print_output(format, &report, |out| render_next_version(out, &report))
}

fn render_next_version(out: &mut String, report: &NextVersionReport) -> fmt::Result {
  if report.bump {
    writeln!(out, "📦 {} → {}", report.current, report.next)?;
  } else {
    writeln!(out, "⚪ {} (no release warranted)", report.current)?;
  }
  if report.skipped > 0 {
    writeln!(out, "   ⚠️  {} unclassifiable change(s) skipped", report.skipped)?;
  }
  Ok(())
}

/// Print the changelog section for `version`
pub fn run_changelog(ctx: &WorkspaceContext, version: String, changes: Vec<String>, format: OutputFormat) -> ShipResult<()> {
  let version = SemanticVersion::parse(&version)?;
  let builder = ctx.config.changelog_builder()?;
  let (accepted, _) = accepted_changes(ctx, changes);
  let preview = ChangelogPreview {
    version,
    changelog: builder.build(&version, &accepted),
  };
  print_output(format, &preview, |out| out.write_str(&preview.changelog))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_render_next_version() {
    let mut out = String::new();
    let report = NextVersionReport {
      current: SemanticVersion::new(0, 4, 2),
      next: SemanticVersion::new(0, 5, 0),
      bump: true,
      changes: 1,
      skipped: 2,
    };
    render_next_version(&mut out, &report).unwrap();
    assert_eq!(out, "📦 0.4.2 → 0.5.0\n   ⚠️  2 unclassifiable change(s) skipped\n");

    let mut out = String::new();
    let unchanged = NextVersionReport {
      next: report.current,
      bump: false,
      skipped: 0,
      ..report
    };
    render_next_version(&mut out, &unchanged).unwrap();
    assert_eq!(out, "⚪ 0.4.2 (no release warranted)\n");
  }
}
