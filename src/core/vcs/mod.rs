pub mod system_git;

pub use system_git::SystemGit;

/// A commit as the release engine sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
  pub sha: String,
  /// Full message: header, body and footers
  pub message: String,
}
