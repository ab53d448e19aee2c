//! Stage executor that runs configured external commands
//!
//! Each stage command receives:
//! - `SHIPRAIL_VERSION`: release version (`1.2.0`)
//! - `SHIPRAIL_TAG`: release tag (`v1.2.0`)
//! - `SHIPRAIL_ARTIFACTS`: newline-separated artifact paths (empty during build)

use crate::core::config::PublishConfig;
use crate::core::error::{ResultExt, ShipError, ShipResult};
use crate::publish::pipeline::{PublishRun, StageExecutor};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Runs `[publish.stages]` argv arrays from the workspace root
pub struct CommandExecutor {
  root: PathBuf,
  config: PublishConfig,
}

impl CommandExecutor {
  pub fn new(root: &Path, config: PublishConfig) -> Self {
    Self {
      root: root.to_path_buf(),
      config,
    }
  }

  /// Run a stage command. `None` when the stage has no command configured.
  fn run_stage(&self, stage: &str, argv: Option<&Vec<String>>, run: &PublishRun) -> ShipResult<Option<Output>> {
    let Some((program, args)) = argv.and_then(|argv| argv.split_first()) else {
      tracing::debug!(stage, "no command configured, skipping");
      return Ok(None);
    };

    let artifacts = run.artifacts.iter().cloned().collect::<Vec<_>>().join("\n");
    tracing::info!(stage, command = %program, "running stage command");

    let output = Command::new(program)
      .args(args)
      .current_dir(&self.root)
      .env("SHIPRAIL_VERSION", run.version.to_string())
      .env("SHIPRAIL_TAG", &run.tag)
      .env("SHIPRAIL_ARTIFACTS", artifacts)
      .output()
      .with_context(|| format!("Failed to spawn {} command '{}'", stage, program))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
      return Err(ShipError::message(format!(
        "{} command '{}' exited with {}: {}",
        stage,
        program,
        code,
        stderr.trim()
      )));
    }

    Ok(Some(output))
  }

  /// Files directly inside the artifacts directory, relative to the root
  fn artifacts_from_dir(&self) -> ShipResult<BTreeSet<String>> {
    let dir = self.root.join(&self.config.artifacts_dir);
    if !dir.is_dir() {
      return Ok(BTreeSet::new());
    }

    let mut artifacts = BTreeSet::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))? {
      let entry = entry?;
      if entry.file_type()?.is_file() {
        let relative = Path::new(&self.config.artifacts_dir).join(entry.file_name());
        artifacts.insert(relative.to_string_lossy().into_owned());
      }
    }
    Ok(artifacts)
  }
}

impl StageExecutor for CommandExecutor {
  fn build(&self, run: &PublishRun) -> ShipResult<BTreeSet<String>> {
    let output = self.run_stage("build", self.config.stages.build.as_ref(), run)?;

    let listed: BTreeSet<String> = output
      .map(|o| {
        String::from_utf8_lossy(&o.stdout)
          .lines()
          .map(str::trim)
          .filter(|l| !l.is_empty())
          .map(str::to_string)
          .collect()
      })
      .unwrap_or_default();

    if listed.is_empty() {
      self.artifacts_from_dir()
    } else {
      Ok(listed)
    }
  }

  fn verify_artifacts(&self, artifacts: &BTreeSet<String>) -> ShipResult<()> {
    let missing: Vec<&String> = artifacts.iter().filter(|a| !self.root.join(a).exists()).collect();
    if missing.is_empty() {
      return Ok(());
    }
    Err(ShipError::message(format!(
      "artifacts missing on disk: {}",
      missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    )))
  }

  fn sign(&self, run: &PublishRun) -> ShipResult<()> {
    self.run_stage("sign", self.config.stages.sign.as_ref(), run).map(|_| ())
  }

  fn attest(&self, run: &PublishRun) -> ShipResult<()> {
    self.run_stage("attest", self.config.stages.attest.as_ref(), run).map(|_| ())
  }

  fn publish(&self, run: &PublishRun) -> ShipResult<()> {
    self.run_stage("publish", self.config.stages.publish.as_ref(), run).map(|_| ())
  }
}
