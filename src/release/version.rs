//! Semantic versions and next-version calculation

use crate::core::error::{ShipError, ShipResult};
use crate::release::classifier::{ChangeDescriptor, ChangeType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// `MAJOR.MINOR.PATCH`, totally ordered by its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemanticVersion {
  pub major: u64,
  pub minor: u64,
  pub patch: u64,
}

impl SemanticVersion {
  pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
    Self { major, minor, patch }
  }

  /// Parse `X.Y.Z`; pre-release and build metadata are rejected
  pub fn parse(input: &str) -> ShipResult<Self> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let version = semver::Version::parse(trimmed)?;
    if !version.pre.is_empty() || !version.build.is_empty() {
      return Err(ShipError::with_help(
        format!("Unsupported version '{}': pre-release and build metadata are not allowed", input),
        "Use a plain MAJOR.MINOR.PATCH version such as 1.4.0",
      ));
    }
    Ok(Self::new(version.major, version.minor, version.patch))
  }

  pub fn is_pre_1_0(&self) -> bool {
    self.major == 0
  }

  /// Apply a bump, honouring the pre-1.0 breaking policy. Fails when a field would overflow.
  pub fn bump(&self, bump: VersionBump, pre_1_0: Pre1BreakingPolicy) -> ShipResult<Self> {
    let bumped = match bump {
      VersionBump::Major if self.is_pre_1_0() && pre_1_0 == Pre1BreakingPolicy::Minor => {
        Self::new(self.major, self.increment(self.minor, "minor")?, 0)
      }
      VersionBump::Major => Self::new(self.increment(self.major, "major")?, 0, 0),
      VersionBump::Minor => Self::new(self.major, self.increment(self.minor, "minor")?, 0),
      VersionBump::Patch => Self::new(self.major, self.minor, self.increment(self.patch, "patch")?),
      VersionBump::None => *self,
    };
    Ok(bumped)
  }

  fn increment(&self, field: u64, name: &str) -> ShipResult<u64> {
    field.checked_add(1).ok_or_else(|| {
      ShipError::with_help(
        format!("Cannot bump {}: the {} component is already at its maximum", self, name),
        "Release from a smaller version (check `release.initial_version` and the latest release tag)",
      )
    })
  }
}

impl fmt::Display for SemanticVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

impl FromStr for SemanticVersion {
  type Err = ShipError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl Serialize for SemanticVersion {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for SemanticVersion {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Self::parse(&raw).map_err(serde::de::Error::custom)
  }
}

/// Version bump type, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
  /// No bump needed (no relevant changes)
  None,
  /// Patch version bump (bug fixes)
  Patch,
  /// Minor version bump (new features)
  Minor,
  /// Major version bump (breaking changes)
  Major,
}

/// How a breaking change bumps a `0.y.z` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Pre1BreakingPolicy {
  /// `0.9.0` + breaking → `0.10.0`
  #[default]
  Minor,
  /// `0.9.0` + breaking → `1.0.0`
  Major,
}

/// Which change types carry which bump signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BumpPolicy {
  #[serde(default)]
  pub major: Vec<ChangeType>,
  #[serde(default = "default_minor_types")]
  pub minor: Vec<ChangeType>,
  #[serde(default = "default_patch_types")]
  pub patch: Vec<ChangeType>,
  #[serde(default, skip)]
  pub pre_1_0_breaking: Pre1BreakingPolicy,
}

fn default_minor_types() -> Vec<ChangeType> {
  vec![ChangeType::Feat]
}

fn default_patch_types() -> Vec<ChangeType> {
  vec![ChangeType::Fix]
}

impl Default for BumpPolicy {
  fn default() -> Self {
    Self {
      major: Vec::new(),
      minor: default_minor_types(),
      patch: default_patch_types(),
      pre_1_0_breaking: Pre1BreakingPolicy::default(),
    }
  }
}

impl BumpPolicy {
  /// Signal carried by a single change; breaking always dominates
  pub fn signal(&self, change: &ChangeDescriptor) -> VersionBump {
    let change_type = change.change_type();
    if change.is_breaking() || self.major.contains(&change_type) {
      VersionBump::Major
    } else if self.minor.contains(&change_type) {
      VersionBump::Minor
    } else if self.patch.contains(&change_type) {
      VersionBump::Patch
    } else {
      VersionBump::None
    }
  }

  /// A qualifying change triggers a version bump on its own
  pub fn is_qualifying(&self, change: &ChangeDescriptor) -> bool {
    self.signal(change) != VersionBump::None
  }

  /// Highest signal across all changes; independent of their order
  pub fn highest_signal<'a>(&self, changes: impl IntoIterator<Item = &'a ChangeDescriptor>) -> VersionBump {
    changes
      .into_iter()
      .map(|c| self.signal(c))
      .max()
      .unwrap_or(VersionBump::None)
  }
}

/// Compute the next version. Returns `current` unchanged when nothing warrants a release.
pub fn next_version(
  current: SemanticVersion,
  changes: &[ChangeDescriptor],
  policy: &BumpPolicy,
) -> ShipResult<SemanticVersion> {
  current.bump(policy.highest_signal(changes), policy.pre_1_0_breaking)
}
