//! Workspace context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   WorkspaceContext::build() -> &WorkspaceContext
//!   |
//!   v
//! commands/ingest.rs, proposal.rs, publish.rs:
//!   fn run_*(ctx: &WorkspaceContext, ...)
//! ```

use crate::core::config::ShipConfig;
use crate::core::error::{ShipError, ShipResult};
use crate::core::vcs::SystemGit;
use crate::release::orchestrator::{ReleaseOrchestrator, ReleaseState};
use crate::release::state::StateStore;
use std::path::{Path, PathBuf};

/// Shared workspace-level data for all commands
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
  /// Workspace root directory
  pub root: PathBuf,

  /// Loaded config, or built-in defaults when no file exists
  pub config: ShipConfig,

  /// Persistent release state under `.shiprail/`
  pub store: StateStore,
}

impl WorkspaceContext {
  /// Load config from `explicit` or the search paths under `root`
  pub fn build(root: &Path, explicit_config: Option<&Path>) -> ShipResult<Self> {
    let config = ShipConfig::load(root, explicit_config)?;
    if let Some(source) = &config.source {
      tracing::debug!(path = %source.display(), "config loaded");
    }
    Ok(Self {
      root: root.to_path_buf(),
      config,
      store: StateStore::new(root),
    })
  }

  /// Context with built-in defaults, for commands that must run on a broken config
  pub fn with_defaults(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      config: ShipConfig::default(),
      store: StateStore::new(root),
    }
  }

  /// Open the git repository containing the workspace
  pub fn git(&self) -> ShipResult<SystemGit> {
    SystemGit::open(&self.root)
  }

  /// Tags for version-conflict detection. Outside a git repository there are none.
  pub fn existing_tags(&self) -> ShipResult<Vec<String>> {
    match self.git() {
      Ok(git) => git.list_tags(),
      Err(ShipError::Git(e)) => {
        tracing::debug!(error = %e, "no git repository, skipping tag conflict checks");
        Ok(Vec::new())
      }
      Err(e) => Err(e),
    }
  }

  /// Orchestrator over persisted state, configured from this workspace
  pub fn orchestrator(&self, state: ReleaseState) -> ShipResult<ReleaseOrchestrator> {
    let settings = self.config.orchestrator_settings()?;
    Ok(ReleaseOrchestrator::new(settings, state)?.with_existing_tags(self.existing_tags()?))
  }

  /// Absolute path of the changelog file
  pub fn changelog_path(&self) -> PathBuf {
    self.root.join(&self.config.changelog.path)
  }
}
