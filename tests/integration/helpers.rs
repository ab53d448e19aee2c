//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A test workspace with git history
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestWorkspace {
  /// Create a new test workspace with one initial commit
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "commit.gpgsign", "false"])?;
    git(&path, &["config", "tag.gpgsign", "false"])?;

    std::fs::write(path.join("README.md"), "# test project\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "chore: initial project setup"])?;

    Ok(Self { _root: root, path })
  }

  /// Write shiprail.toml
  pub fn write_config(&self, content: &str) -> Result<()> {
    std::fs::write(self.path.join("shiprail.toml"), content)?;
    Ok(())
  }

  /// Commit an empty change with `message`, returning its SHA
  pub fn commit(&self, message: &str) -> Result<String> {
    git(&self.path, &["commit", "--allow-empty", "-m", message])?;
    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Create a lightweight tag at HEAD
  pub fn tag(&self, name: &str) -> Result<()> {
    git(&self.path, &["tag", name])?;
    Ok(())
  }

  /// Check if a file exists
  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  /// Read a file
  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }

  /// Parsed `.shiprail/state.json`
  pub fn state(&self) -> Result<serde_json::Value> {
    let content = self.read_file(".shiprail/state.json")?;
    Ok(serde_json::from_str(&content)?)
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run shiprail without checking the exit status
pub fn shiprail_raw(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_shiprail");
  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .env_remove("SHIPRAIL_CONFIG")
    .env_remove("SHIPRAIL_LOG_LEVEL")
    .env_remove("RUST_LOG")
    .output()
    .context("Failed to run shiprail")
}

/// Run shiprail, failing on a non-zero exit
pub fn run_shiprail(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = shiprail_raw(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "shiprail command failed: shiprail {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Run shiprail with `--json` appended and parse stdout
pub fn run_shiprail_json(cwd: &Path, args: &[&str]) -> Result<serde_json::Value> {
  let mut args = args.to_vec();
  args.push("--json");
  let output = run_shiprail(cwd, &args)?;
  serde_json::from_slice(&output.stdout).context("shiprail did not print valid JSON")
}
