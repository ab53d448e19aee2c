//! Conventional commit classification
//!
//! Parses a commit subject or PR title of the form
//! `type(scope)!: description` into a [`ChangeDescriptor`]. The classifier is
//! pure and total: every input yields either a descriptor or one specific
//! [`ClassificationReason`].

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Default minimum description length before a quality warning is raised
pub const DEFAULT_MIN_DESCRIPTION_LENGTH: usize = 10;

static SCOPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

/// Conventional commit types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
  Feat,
  Fix,
  Docs,
  Style,
  Refactor,
  Perf,
  Test,
  Build,
  Ci,
  Chore,
}

impl ChangeType {
  pub const ALL: [ChangeType; 10] = [
    ChangeType::Feat,
    ChangeType::Fix,
    ChangeType::Docs,
    ChangeType::Style,
    ChangeType::Refactor,
    ChangeType::Perf,
    ChangeType::Test,
    ChangeType::Build,
    ChangeType::Ci,
    ChangeType::Chore,
  ];

  /// Wire name as it appears in commit headers
  pub fn as_str(&self) -> &'static str {
    match self {
      ChangeType::Feat => "feat",
      ChangeType::Fix => "fix",
      ChangeType::Docs => "docs",
      ChangeType::Style => "style",
      ChangeType::Refactor => "refactor",
      ChangeType::Perf => "perf",
      ChangeType::Test => "test",
      ChangeType::Build => "build",
      ChangeType::Ci => "ci",
      ChangeType::Chore => "chore",
    }
  }
}

impl FromStr for ChangeType {
  type Err = ();

  /// Case-sensitive exact match; `Feat` and `feature` are not accepted
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ChangeType::ALL.iter().copied().find(|t| t.as_str() == s).ok_or(())
  }
}

impl fmt::Display for ChangeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A classified change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
  #[serde(rename = "type")]
  change_type: ChangeType,
  scope: Option<String>,
  breaking: bool,
  description: String,
  source_ref: String,
}

impl ChangeDescriptor {
  pub fn change_type(&self) -> ChangeType {
    self.change_type
  }

  pub fn scope(&self) -> Option<&str> {
    self.scope.as_deref()
  }

  pub fn is_breaking(&self) -> bool {
    self.breaking
  }

  pub fn description(&self) -> &str {
    &self.description
  }

  /// Commit SHA or PR identifier the change came from
  pub fn source_ref(&self) -> &str {
    &self.source_ref
  }

  /// Rebuild the canonical header line: `type(scope)!: description`
  pub fn to_header(&self) -> String {
    let mut header = String::from(self.change_type.as_str());
    if let Some(scope) = &self.scope {
      header.push('(');
      header.push_str(scope);
      header.push(')');
    }
    if self.breaking {
      header.push('!');
    }
    header.push_str(": ");
    header.push_str(&self.description);
    header
  }
}

/// Why a line failed to classify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationReason {
  MissingType,
  UnknownType,
  MalformedScope,
  MissingSeparator,
  EmptyDescription,
}

impl ClassificationReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      ClassificationReason::MissingType => "missing-type",
      ClassificationReason::UnknownType => "unknown-type",
      ClassificationReason::MalformedScope => "malformed-scope",
      ClassificationReason::MissingSeparator => "missing-separator",
      ClassificationReason::EmptyDescription => "empty-description",
    }
  }
}

impl fmt::Display for ClassificationReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Malformed commit subject. Recoverable: the caller rejects this one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationError {
  pub reason: ClassificationReason,
  pub input: String,
}

impl fmt::Display for ClassificationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Cannot classify '{}': {}", self.input, self.reason)
  }
}

impl std::error::Error for ClassificationError {}

/// Non-fatal quality findings on an accepted descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
  ShortDescription { length: usize, minimum: usize },
}

impl fmt::Display for QualityWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QualityWarning::ShortDescription { length, minimum } => write!(
        f,
        "description is {} characters (recommended minimum {})",
        length, minimum
      ),
    }
  }
}

/// Successful classification plus any quality warnings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
  pub descriptor: ChangeDescriptor,
  pub warnings: Vec<QualityWarning>,
}

/// Per-item outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
  pub input: String,
  pub source_ref: String,
  #[serde(flatten)]
  pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
  Classified(Classification),
  Rejected { reason: ClassificationReason },
}

/// Commit classifier with a configurable quality threshold
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
  min_description_length: usize,
}

impl Default for Classifier {
  fn default() -> Self {
    Self::new(DEFAULT_MIN_DESCRIPTION_LENGTH)
  }
}

impl Classifier {
  pub fn new(min_description_length: usize) -> Self {
    Self { min_description_length }
  }

  /// Classify the first line of `text`
  pub fn classify(&self, text: &str, source_ref: &str) -> Result<Classification, ClassificationError> {
    let header = text.lines().next().unwrap_or("");
    let fail = |reason| ClassificationError {
      reason,
      input: header.to_string(),
    };

    // the type token runs up to the scope, the `!`, the colon or whitespace
    let type_len = header
      .find(|c: char| matches!(c, '(' | '!' | ':') || c.is_whitespace())
      .unwrap_or(header.len());
    if type_len == 0 {
      return Err(fail(ClassificationReason::MissingType));
    }
    let change_type: ChangeType = header[..type_len]
      .parse()
      .map_err(|_| fail(ClassificationReason::UnknownType))?;
    let mut rest = &header[type_len..];

    let mut scope = None;
    if let Some(after_paren) = rest.strip_prefix('(') {
      let close = after_paren.find(')').ok_or_else(|| fail(ClassificationReason::MalformedScope))?;
      let candidate = &after_paren[..close];
      if !SCOPE_RE.is_match(candidate) {
        return Err(fail(ClassificationReason::MalformedScope));
      }
      scope = Some(candidate.to_string());
      rest = &after_paren[close + 1..];
    }

    let breaking = match rest.strip_prefix('!') {
      Some(after_bang) => {
        rest = after_bang;
        true
      }
      None => false,
    };

    let after_colon = rest
      .strip_prefix(':')
      .ok_or_else(|| fail(ClassificationReason::MissingSeparator))?;
    if after_colon.trim().is_empty() {
      return Err(fail(ClassificationReason::EmptyDescription));
    }
    let description = after_colon
      .strip_prefix(' ')
      .ok_or_else(|| fail(ClassificationReason::MissingSeparator))?
      .trim();

    let descriptor = ChangeDescriptor {
      change_type,
      scope,
      breaking,
      description: description.to_string(),
      source_ref: source_ref.to_string(),
    };
    let warnings = self.quality_warnings(&descriptor);

    Ok(Classification { descriptor, warnings })
  }

  /// Classify a full commit message; a `BREAKING CHANGE:` footer marks the change breaking
  pub fn classify_message(&self, message: &str, source_ref: &str) -> Result<Classification, ClassificationError> {
    let mut classification = self.classify(message, source_ref)?;
    let footer_breaking = message.lines().skip(1).any(|line| {
      let line = line.trim_start();
      line.starts_with("BREAKING CHANGE:") || line.starts_with("BREAKING-CHANGE:")
    });
    if footer_breaking {
      classification.descriptor.breaking = true;
    }
    Ok(classification)
  }

  /// Classify many inputs; a failed item never affects the others
  pub fn classify_batch(&self, inputs: &[(String, String)]) -> Vec<BatchItem> {
    inputs
      .par_iter()
      .map(|(text, source_ref)| {
        let outcome = match self.classify_message(text, source_ref) {
          Ok(classification) => BatchOutcome::Classified(classification),
          Err(err) => BatchOutcome::Rejected { reason: err.reason },
        };
        BatchItem {
          input: text.lines().next().unwrap_or("").to_string(),
          source_ref: source_ref.clone(),
          outcome,
        }
      })
      .collect()
  }

  fn quality_warnings(&self, descriptor: &ChangeDescriptor) -> Vec<QualityWarning> {
    let length = descriptor.description.chars().count();
    if length < self.min_description_length {
      vec![QualityWarning::ShortDescription {
        length,
        minimum: self.min_description_length,
      }]
    } else {
      Vec::new()
    }
  }
}

/// Classify with the default threshold
pub fn classify(text: &str) -> Result<ChangeDescriptor, ClassificationError> {
  Classifier::default().classify(text, "").map(|c| c.descriptor)
}

#[cfg(test)]
pub(crate) fn change(header: &str, source_ref: &str) -> ChangeDescriptor {
  Classifier::default()
    .classify(header, source_ref)
    .expect("test header must classify")
    .descriptor
}
