//! Error types for shiprail with contextual messages and exit codes
//!
//! Every failure the engine can surface maps to one variant here. Per-item
//! failures (a single unparseable commit subject) are `Classification` and
//! never abort a batch; state-machine violations are `ProposalState` and are
//! always surfaced to the operator.

use crate::release::classifier::ClassificationError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for shiprail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, malformed input)
  User = 1,
  /// System error (git, I/O, external stage)
  System = 2,
  /// Validation failure (classification, version conflict, state invariant)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for shiprail
#[derive(Debug)]
pub enum ShipError {
  /// Configuration errors
  Config(ConfigError),

  /// Commit subject did not match the conventional grammar
  Classification(ClassificationError),

  /// Computed version collides with an existing release
  VersionConflict(VersionConflictError),

  /// Release proposal state machine invariant violated
  ProposalState(ProposalStateError),

  /// External publish stage failed
  PublishStage(PublishStageError),

  /// Git operation errors
  Git(GitError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ShipError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ShipError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ShipError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ShipError::Message { message, context, help } => ShipError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ShipError::Io(err) => ShipError::Message {
        message: format!("{}: {}", ctx_str, err),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ShipError::Config(_) => ExitCode::User,
      ShipError::Classification(_) => ExitCode::Validation,
      ShipError::VersionConflict(_) => ExitCode::Validation,
      ShipError::ProposalState(_) => ExitCode::Validation,
      ShipError::PublishStage(_) => ExitCode::System,
      ShipError::Git(_) => ExitCode::System,
      ShipError::Io(_) => ExitCode::System,
      ShipError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ShipError::Config(e) => e.help_message(),
      ShipError::Classification(_) => {
        Some("Use the form `type(scope)!: description`, e.g. `feat(auth): add device login flow`.".to_string())
      }
      ShipError::VersionConflict(e) => Some(format!(
        "{} is already taken by {}. Delete or rename the stale tag, or raise `release.initial_version` above it.",
        e.version, e.tag
      )),
      ShipError::ProposalState(e) => e.help_message(),
      ShipError::PublishStage(e) => Some(format!(
        "Fix the {} stage, then resume with `shiprail publish retry {}`.",
        e.stage, e.run_id
      )),
      ShipError::Git(e) => e.help_message(),
      ShipError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ShipError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShipError::Config(e) => write!(f, "{}", e),
      ShipError::Classification(e) => write!(f, "{}", e),
      ShipError::VersionConflict(e) => write!(f, "{}", e),
      ShipError::ProposalState(e) => write!(f, "{}", e),
      ShipError::PublishStage(e) => write!(f, "{}", e),
      ShipError::Git(e) => write!(f, "{}", e),
      ShipError::Io(e) => write!(f, "I/O error: {}", e),
      ShipError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ShipError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ShipError::Io(e) => Some(e),
      ShipError::Classification(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ShipError {
  fn from(err: io::Error) -> Self {
    ShipError::Io(err)
  }
}

impl From<String> for ShipError {
  fn from(msg: String) -> Self {
    ShipError::message(msg)
  }
}

impl From<&str> for ShipError {
  fn from(msg: &str) -> Self {
    ShipError::message(msg)
  }
}

impl From<ClassificationError> for ShipError {
  fn from(err: ClassificationError) -> Self {
    ShipError::Classification(err)
  }
}

impl From<VersionConflictError> for ShipError {
  fn from(err: VersionConflictError) -> Self {
    ShipError::VersionConflict(err)
  }
}

impl From<ProposalStateError> for ShipError {
  fn from(err: ProposalStateError) -> Self {
    ShipError::ProposalState(err)
  }
}

impl From<PublishStageError> for ShipError {
  fn from(err: PublishStageError) -> Self {
    ShipError::PublishStage(err)
  }
}

impl From<ConfigError> for ShipError {
  fn from(err: ConfigError) -> Self {
    ShipError::Config(err)
  }
}

impl From<GitError> for ShipError {
  fn from(err: GitError) -> Self {
    ShipError::Git(err)
  }
}

impl From<toml_edit::TomlError> for ShipError {
  fn from(err: toml_edit::TomlError) -> Self {
    ShipError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ShipError {
  fn from(err: toml_edit::de::Error) -> Self {
    ShipError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<toml_edit::ser::Error> for ShipError {
  fn from(err: toml_edit::ser::Error) -> Self {
    ShipError::message(format!("TOML serialization error: {}", err))
  }
}

impl From<serde_json::Error> for ShipError {
  fn from(err: serde_json::Error) -> Self {
    ShipError::message(format!("JSON error: {}", err))
  }
}

impl From<serde_yaml::Error> for ShipError {
  fn from(err: serde_yaml::Error) -> Self {
    ShipError::message(format!("YAML error: {}", err))
  }
}

impl From<std::fmt::Error> for ShipError {
  fn from(_: std::fmt::Error) -> Self {
    ShipError::message("Failed to render output")
  }
}

impl From<semver::Error> for ShipError {
  fn from(err: semver::Error) -> Self {
    ShipError::message(format!("Invalid semantic version: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ShipError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ShipError::message(format!("UTF-8 conversion error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Explicitly requested config file does not exist
  NotFound { path: PathBuf },

  /// A field holds a value outside its domain
  InvalidValue { field: String, value: String, expected: String },

  /// Unsupported schema version
  UnsupportedVersion { found: i64 },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create shiprail.toml in the repository root, or pass --config <path>.".to_string())
      }
      ConfigError::InvalidValue { .. } => Some("Run `shiprail config validate` for a full report.".to_string()),
      ConfigError::UnsupportedVersion { .. } => Some("Set `version = 1` at the top of the config file.".to_string()),
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { path } => write!(f, "Config file not found: {}", path.display()),
      ConfigError::InvalidValue { field, value, expected } => {
        write!(f, "Invalid value '{}' for {} (expected {})", value, field, expected)
      }
      ConfigError::UnsupportedVersion { found } => {
        write!(f, "Unsupported config version: {} (expected: 1)", found)
      }
    }
  }
}

/// A computed version collides with an existing tag or recorded release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflictError {
  pub version: String,
  pub tag: String,
}

impl fmt::Display for VersionConflictError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Version conflict: computed version {} collides with existing tag {}",
      self.version, self.tag
    )
  }
}

/// Release proposal state machine violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalStateError {
  /// More than one pending proposal found in persisted state
  MultiplePending { count: usize },

  /// Event targeted a proposal but the slot is empty
  NoPendingProposal { requested: String },

  /// Event targeted a proposal other than the pending one
  ProposalMismatch { requested: String, pending: String },

  /// Another writer holds the state lock
  Locked { lock_path: PathBuf },
}

impl ProposalStateError {
  fn help_message(&self) -> Option<String> {
    match self {
      ProposalStateError::MultiplePending { .. } => Some(
        "The state file was edited or corrupted. Close the extra proposals by hand in .shiprail/state.json."
          .to_string(),
      ),
      ProposalStateError::NoPendingProposal { .. } => {
        Some("Run `shiprail proposal show` to see the current proposal slot.".to_string())
      }
      ProposalStateError::ProposalMismatch { pending, .. } => Some(format!(
        "The proposal changed since the event was issued. The current pending proposal is {}.",
        pending
      )),
      ProposalStateError::Locked { lock_path } => Some(format!(
        "Another shiprail process is running. If none is, remove the stale lock: {}",
        lock_path.display()
      )),
    }
  }
}

impl fmt::Display for ProposalStateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProposalStateError::MultiplePending { count } => {
        write!(f, "Invariant violated: {} pending release proposals found (at most one allowed)", count)
      }
      ProposalStateError::NoPendingProposal { requested } => {
        write!(f, "No pending release proposal (event targeted {})", requested)
      }
      ProposalStateError::ProposalMismatch { requested, pending } => {
        write!(f, "Event targeted proposal {} but the pending proposal is {}", requested, pending)
      }
      ProposalStateError::Locked { lock_path } => {
        write!(f, "Release state is locked by another writer: {}", lock_path.display())
      }
    }
  }
}

/// External publish stage failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishStageError {
  pub run_id: String,
  pub stage: String,
  pub reason: String,
}

impl fmt::Display for PublishStageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Publish run {} failed at {}: {}", self.run_id, self.stage, self.reason)
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::RepoNotFound { path } => Some(format!(
        "Run shiprail inside a git repository, or pass --change instead of --from-git: {}",
        path.display()
      )),
      GitError::CommandFailed { .. } => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
    }
  }
}

/// Result type alias for shiprail
pub type ShipResult<T> = Result<T, ShipError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ShipResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ShipResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ShipError>,
{
  fn context(self, ctx: impl Into<String>) -> ShipResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ShipResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ShipError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
