//! System git backend
//!
//! Runs the `git` binary with an isolated environment. Only the handful of
//! read-only queries the release engine needs: tags, commits since a tag, HEAD.

use crate::core::error::{GitError, ResultExt, ShipError, ShipResult};
use crate::core::vcs::CommitInfo;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Field and record separators for `git log` output
const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

/// Git backend using system git
pub struct SystemGit {
  /// Repository working directory
  pub(crate) repo_path: PathBuf,

  /// Working tree root
  pub(crate) work_tree: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  ///
  /// This performs ONE subprocess call to get the repository metadata.
  pub fn open(path: &Path) -> ShipResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(ShipError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(ShipError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(Self {
      repo_path: path.to_path_buf(),
      work_tree: PathBuf::from(stdout.trim()),
    })
  }

  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> ShipResult<String> {
    let output = self.run(&["rev-parse", "HEAD"], "Failed to get HEAD commit")?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// All tag names in the repository
  pub fn list_tags(&self) -> ShipResult<Vec<String>> {
    let output = self.run(&["tag", "--list"], "Failed to list tags")?;
    Ok(
      String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect(),
    )
  }

  /// Non-merge commits after `since` (or all of history), oldest first
  pub fn commits_since(&self, since: Option<&str>) -> ShipResult<Vec<CommitInfo>> {
    let range = match since {
      Some(tag) => format!("{}..HEAD", tag),
      None => "HEAD".to_string(),
    };
    let format = format!("--format=%H{}%B{}", FIELD_SEP, RECORD_SEP);

    let output = self
      .git_cmd()
      .args(["log", "--reverse", "--no-merges", &format, &range])
      .output()
      .context("Failed to run git log")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      // fresh repository without commits
      if stderr.contains("does not have any commits") || stderr.contains("unknown revision") && since.is_none() {
        return Ok(Vec::new());
      }
      return Err(ShipError::Git(GitError::CommandFailed {
        command: format!("git log {}", range),
        stderr: stderr.to_string(),
      }));
    }

    Ok(parse_log(&String::from_utf8_lossy(&output.stdout)))
  }

  fn run(&self, args: &[&str], what: &str) -> ShipResult<Output> {
    let output = self.git_cmd().args(args).output().context(what.to_string())?;
    if !output.status.success() {
      return Err(ShipError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }
    Ok(output)
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.repo_path);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    cmd.arg("-c").arg("core.quotePath=false");
    cmd.arg("-c").arg("log.showSignature=false");

    cmd
  }
}

fn parse_log(raw: &str) -> Vec<CommitInfo> {
  raw
    .split(RECORD_SEP)
    .filter_map(|record| {
      let (sha, message) = record.trim_start_matches('\n').split_once(FIELD_SEP)?;
      let sha = sha.trim();
      if sha.is_empty() {
        return None;
      }
      Some(CommitInfo {
        sha: sha.to_string(),
        message: message.trim_end().to_string(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_log_records() {
    let raw = "aaa\x1ffeat: add device login flow\n\nBody text\n\x1e\nbbb\x1ffix: handle empty tag list\n\x1e\n";
    let commits = parse_log(raw);
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].sha, "aaa");
    assert_eq!(commits[0].message, "feat: add device login flow\n\nBody text");
    assert_eq!(commits[1].sha, "bbb");
    assert_eq!(commits[1].message, "fix: handle empty tag list");
  }

  #[test]
  fn test_parse_log_empty() {
    assert!(parse_log("").is_empty());
    assert!(parse_log("\n").is_empty());
  }
}
