//! Changelog section rendering from classified changes
//!
//! Changes are grouped into sections in a configurable priority order.
//! A breaking change is rendered once, under "Breaking Changes", whatever
//! its type. Within a section the accumulation order is kept.
//!
//! ```text
//! ## [1.2.0]
//!
//! ### Features
//!
//! - **auth:** add OAuth device flow (abc1234)
//! ```

use crate::release::classifier::{ChangeDescriptor, ChangeType};
use crate::release::version::SemanticVersion;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of abbreviated commit SHAs in rendered entries
const SHORT_SHA_LEN: usize = 7;

/// A changelog section: the breaking bucket or one change type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
  Breaking,
  Type(ChangeType),
}

impl Section {
  /// Default priority order
  pub const DEFAULT_ORDER: [Section; 11] = [
    Section::Breaking,
    Section::Type(ChangeType::Feat),
    Section::Type(ChangeType::Fix),
    Section::Type(ChangeType::Perf),
    Section::Type(ChangeType::Docs),
    Section::Type(ChangeType::Refactor),
    Section::Type(ChangeType::Style),
    Section::Type(ChangeType::Test),
    Section::Type(ChangeType::Build),
    Section::Type(ChangeType::Ci),
    Section::Type(ChangeType::Chore),
  ];

  /// Heading rendered under `###`
  pub fn title(&self) -> &'static str {
    match self {
      Section::Breaking => "Breaking Changes",
      Section::Type(ChangeType::Feat) => "Features",
      Section::Type(ChangeType::Fix) => "Bug Fixes",
      Section::Type(ChangeType::Perf) => "Performance",
      Section::Type(ChangeType::Docs) => "Documentation",
      Section::Type(ChangeType::Refactor) => "Refactoring",
      Section::Type(ChangeType::Style) => "Styles",
      Section::Type(ChangeType::Test) => "Tests",
      Section::Type(ChangeType::Build) => "Build System",
      Section::Type(ChangeType::Ci) => "Continuous Integration",
      Section::Type(ChangeType::Chore) => "Chores",
    }
  }

  /// Config key: `breaking` or a change type name
  pub fn key(&self) -> &'static str {
    match self {
      Section::Breaking => "breaking",
      Section::Type(t) => t.as_str(),
    }
  }

  /// Section a change belongs to
  pub fn of(change: &ChangeDescriptor) -> Self {
    if change.is_breaking() {
      Section::Breaking
    } else {
      Section::Type(change.change_type())
    }
  }
}

impl fmt::Display for Section {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.key())
  }
}

impl FromStr for Section {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == "breaking" {
      return Ok(Section::Breaking);
    }
    s.parse::<ChangeType>()
      .map(Section::Type)
      .map_err(|_| format!("unknown changelog section '{}'", s))
  }
}

impl Serialize for Section {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.key())
  }
}

impl<'de> Deserialize<'de> for Section {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

/// Renders changelog sections in a fixed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogBuilder {
  order: Vec<Section>,
}

impl Default for ChangelogBuilder {
  fn default() -> Self {
    Self {
      order: Section::DEFAULT_ORDER.to_vec(),
    }
  }
}

impl ChangelogBuilder {
  /// Builder with a custom order. Duplicates are dropped; sections missing
  /// from `order` follow in default order so no change is ever lost.
  pub fn with_order(order: &[Section]) -> Self {
    let mut resolved: Vec<Section> = Vec::with_capacity(Section::DEFAULT_ORDER.len());
    for section in order.iter().chain(Section::DEFAULT_ORDER.iter()) {
      if !resolved.contains(section) {
        resolved.push(*section);
      }
    }
    Self { order: resolved }
  }

  pub fn order(&self) -> &[Section] {
    &self.order
  }

  /// Render the section for `version`. Output depends only on the inputs.
  pub fn build(&self, version: &SemanticVersion, changes: &[ChangeDescriptor]) -> String {
    self.render(&format!("## [{}]", version), changes)
  }

  /// Same as [`build`](Self::build), with a release date in the header
  pub fn build_dated(&self, version: &SemanticVersion, date: &str, changes: &[ChangeDescriptor]) -> String {
    self.render(&format!("## [{}] - {}", version, date), changes)
  }

  fn render(&self, header: &str, changes: &[ChangeDescriptor]) -> String {
    let mut output = String::new();
    output.push_str(header);
    output.push('\n');

    for section in &self.order {
      let mut entries = changes.iter().filter(|c| Section::of(c) == *section).peekable();
      if entries.peek().is_none() {
        continue;
      }

      output.push_str(&format!("\n### {}\n\n", section.title()));
      for change in entries {
        output.push_str(&render_entry(change));
        output.push('\n');
      }
    }

    output
  }
}

/// Render with the default section order
pub fn build(version: &SemanticVersion, changes: &[ChangeDescriptor]) -> String {
  ChangelogBuilder::default().build(version, changes)
}

fn render_entry(change: &ChangeDescriptor) -> String {
  let mut line = String::from("- ");
  if let Some(scope) = change.scope() {
    line.push_str(&format!("**{}:** ", scope));
  }
  line.push_str(&escape_markdown(change.description()));

  let reference = short_ref(change.source_ref());
  if !reference.is_empty() {
    line.push_str(&format!(" ({})", escape_markdown(reference)));
  }
  line
}

/// Shorten full commit SHAs; other refs (PR numbers, branch names) pass through
fn short_ref(source_ref: &str) -> &str {
  let trimmed = source_ref.trim();
  if trimmed.len() > SHORT_SHA_LEN && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
    &trimmed[..SHORT_SHA_LEN]
  } else {
    trimmed
  }
}

/// Neutralize text that would break out of a list item
fn escape_markdown(text: &str) -> String {
  let flattened = text.split(['\n', '\r']).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");
  let flattened = flattened.trim();

  let mut escaped = String::with_capacity(flattened.len());
  for (i, ch) in flattened.chars().enumerate() {
    let leading = i == 0 && matches!(ch, '#' | '>' | '-' | '*' | '+');
    if leading || matches!(ch, '[' | ']' | '`' | '<') {
      escaped.push('\\');
    }
    escaped.push(ch);
  }
  escaped
}
