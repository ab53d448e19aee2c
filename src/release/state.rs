//! Persistent release state under `.shiprail/`
//!
//! `state.json` holds the orchestrator state and the publish runs. Every
//! read-modify-write cycle runs under an exclusive lock file, and writes go
//! through a temp file plus rename so readers never see a torn file.

use crate::core::error::{ProposalStateError, ResultExt, ShipError, ShipResult};
use crate::publish::pipeline::{PublishRun, RunId};
use crate::release::orchestrator::ReleaseState;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const STATE_DIR: &str = ".shiprail";
const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";
const STATE_SCHEMA: u32 = 1;

fn default_schema() -> u32 {
  STATE_SCHEMA
}

/// On-disk layout of `state.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
  #[serde(default = "default_schema")]
  pub schema: u32,
  #[serde(flatten)]
  pub release: ReleaseState,
  #[serde(default)]
  pub publish_runs: Vec<PublishRun>,
}

impl Default for StateFile {
  fn default() -> Self {
    Self {
      schema: STATE_SCHEMA,
      release: ReleaseState::default(),
      publish_runs: Vec::new(),
    }
  }
}

impl StateFile {
  pub fn run(&self, id: &RunId) -> Option<&PublishRun> {
    self.publish_runs.iter().find(|r| r.id == *id)
  }

  pub fn run_mut(&mut self, id: &RunId) -> Option<&mut PublishRun> {
    self.publish_runs.iter_mut().find(|r| r.id == *id)
  }
}

/// Exclusive writer lock; released on drop
#[derive(Debug)]
pub struct StateLock {
  path: PathBuf,
}

impl Drop for StateLock {
  fn drop(&mut self) {
    if let Err(e) = fs::remove_file(&self.path) {
      tracing::warn!(path = %self.path.display(), error = %e, "failed to release state lock");
    }
  }
}

/// Store rooted at a workspace
#[derive(Debug, Clone)]
pub struct StateStore {
  dir: PathBuf,
}

impl StateStore {
  pub fn new(workspace_root: &Path) -> Self {
    Self {
      dir: workspace_root.join(STATE_DIR),
    }
  }

  pub fn state_path(&self) -> PathBuf {
    self.dir.join(STATE_FILE)
  }

  pub fn lock_path(&self) -> PathBuf {
    self.dir.join(LOCK_FILE)
  }

  /// Take the writer lock. Fails immediately if another writer holds it.
  pub fn lock(&self) -> ShipResult<StateLock> {
    fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;
    let path = self.lock_path();
    match OpenOptions::new().write(true).create_new(true).open(&path) {
      Ok(mut file) => {
        // pid is informational, for whoever finds a stale lock
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "state lock acquired");
        Ok(StateLock { path })
      }
      Err(e) if e.kind() == ErrorKind::AlreadyExists => {
        Err(ShipError::ProposalState(ProposalStateError::Locked { lock_path: path }))
      }
      Err(e) => Err(ShipError::from(e).context(format!("Failed to create lock {}", path.display()))),
    }
  }

  /// Load state; a missing file is an empty state. The single-pending invariant is checked.
  pub fn load(&self) -> ShipResult<StateFile> {
    let path = self.state_path();
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StateFile::default()),
      Err(e) => return Err(ShipError::from(e).context(format!("Failed to read {}", path.display()))),
    };

    let state: StateFile =
      serde_json::from_str(&content).with_context(|| format!("Corrupt state file {}", path.display()))?;
    if let Err(violation) = state.release.validate() {
      tracing::error!(path = %path.display(), error = %violation, "release state invariant violated");
      return Err(violation.into());
    }
    Ok(state)
  }

  /// Atomic write: temp file in the same directory, then rename
  pub fn save(&self, state: &StateFile) -> ShipResult<()> {
    fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;
    let path = self.state_path();
    let tmp = self.dir.join(format!("{}.tmp", STATE_FILE));

    let json = serde_json::to_string_pretty(state)?;
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
  }

  /// Locked read-modify-write. Nothing is written when `f` fails.
  pub fn update<T>(&self, f: impl FnOnce(&mut StateFile) -> ShipResult<T>) -> ShipResult<T> {
    let _lock = self.lock()?;
    let mut state = self.load()?;
    let value = f(&mut state)?;
    self.save(&state)?;
    Ok(value)
  }
}
