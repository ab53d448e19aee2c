//! shiprail.toml: schema, defaults, loading and validation
//!
//! A missing file means built-in defaults. `ValidationReport` backs
//! `shiprail config validate` and never fails on a broken file.

use crate::core::error::{ConfigError, ResultExt, ShipError, ShipResult};
use crate::release::changelog::{ChangelogBuilder, Section};
use crate::release::classifier::{ChangeType, Classifier, DEFAULT_MIN_DESCRIPTION_LENGTH};
use crate::release::orchestrator::OrchestratorSettings;
use crate::release::version::{BumpPolicy, Pre1BreakingPolicy, SemanticVersion};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Only supported config schema version
pub const CONFIG_VERSION: i64 = 1;

/// Config file names, searched in order from the workspace root
pub const SEARCH_PATHS: [&str; 3] = ["shiprail.toml", ".shiprail.toml", ".config/shiprail.toml"];

/// Top-level keys the schema knows about
const KNOWN_KEYS: [&str; 6] = ["version", "release", "commits", "changelog", "publish", "logging"];

/// Configuration for shiprail
/// Searched in order: shiprail.toml, .shiprail.toml, .config/shiprail.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
  #[serde(default = "default_config_version")]
  pub version: i64,
  #[serde(default)]
  pub release: ReleaseConfig,
  #[serde(default)]
  pub commits: CommitsConfig,
  #[serde(default)]
  pub changelog: ChangelogConfig,
  #[serde(default)]
  pub publish: PublishConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
  /// File this config was loaded from, `None` for built-in defaults
  #[serde(skip)]
  pub source: Option<PathBuf>,
}

fn default_config_version() -> i64 {
  CONFIG_VERSION
}

impl Default for ShipConfig {
  fn default() -> Self {
    Self {
      version: CONFIG_VERSION,
      release: ReleaseConfig::default(),
      commits: CommitsConfig::default(),
      changelog: ChangelogConfig::default(),
      publish: PublishConfig::default(),
      logging: LoggingConfig::default(),
      source: None,
    }
  }
}

/// `[release]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
  /// Base version before the first release
  #[serde(default = "default_initial_version")]
  pub initial_version: String,

  /// Prefix of release tags (`v` gives `v1.2.3`)
  #[serde(default = "default_tag_prefix")]
  pub tag_prefix: String,

  /// Breaking changes on `0.y.z`: "minor" or "major"
  #[serde(default = "default_pre_1_0_breaking")]
  pub pre_1_0_breaking: String,

  #[serde(default)]
  pub bump: BumpConfig,
}

fn default_initial_version() -> String {
  "0.0.0".to_string()
}

fn default_tag_prefix() -> String {
  "v".to_string()
}

fn default_pre_1_0_breaking() -> String {
  "minor".to_string()
}

impl Default for ReleaseConfig {
  fn default() -> Self {
    Self {
      initial_version: default_initial_version(),
      tag_prefix: default_tag_prefix(),
      pre_1_0_breaking: default_pre_1_0_breaking(),
      bump: BumpConfig::default(),
    }
  }
}

/// `[release.bump]`: change types per bump level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BumpConfig {
  #[serde(default)]
  pub major: Vec<String>,
  #[serde(default = "default_minor_types")]
  pub minor: Vec<String>,
  #[serde(default = "default_patch_types")]
  pub patch: Vec<String>,
}

fn default_minor_types() -> Vec<String> {
  vec!["feat".to_string()]
}

fn default_patch_types() -> Vec<String> {
  vec!["fix".to_string()]
}

impl Default for BumpConfig {
  fn default() -> Self {
    Self {
      major: Vec::new(),
      minor: default_minor_types(),
      patch: default_patch_types(),
    }
  }
}

/// `[commits]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitsConfig {
  /// Descriptions shorter than this get a quality warning
  #[serde(default = "default_min_description_length")]
  pub min_description_length: usize,
}

fn default_min_description_length() -> usize {
  DEFAULT_MIN_DESCRIPTION_LENGTH
}

impl Default for CommitsConfig {
  fn default() -> Self {
    Self {
      min_description_length: default_min_description_length(),
    }
  }
}

/// `[changelog]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogConfig {
  /// Section priority; unlisted sections follow in default order
  #[serde(default = "default_section_order")]
  pub section_order: Vec<String>,

  /// Non-bumping types still listed in a proposal
  #[serde(default = "default_include_types")]
  pub include_types: Vec<String>,

  /// Changelog file updated on merge with --write-changelog
  #[serde(default = "default_changelog_path")]
  pub path: PathBuf,
}

fn default_section_order() -> Vec<String> {
  Section::DEFAULT_ORDER.iter().map(|s| s.key().to_string()).collect()
}

fn default_include_types() -> Vec<String> {
  vec!["perf".to_string(), "docs".to_string()]
}

fn default_changelog_path() -> PathBuf {
  PathBuf::from("CHANGELOG.md")
}

impl Default for ChangelogConfig {
  fn default() -> Self {
    Self {
      section_order: default_section_order(),
      include_types: default_include_types(),
      path: default_changelog_path(),
    }
  }
}

/// `[publish]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
  /// Directory scanned for artifacts when the build command lists none
  #[serde(default = "default_artifacts_dir")]
  pub artifacts_dir: String,

  #[serde(default)]
  pub stages: StageCommands,
}

fn default_artifacts_dir() -> String {
  "dist".to_string()
}

impl Default for PublishConfig {
  fn default() -> Self {
    Self {
      artifacts_dir: default_artifacts_dir(),
      stages: StageCommands::default(),
    }
  }
}

/// `[publish.stages]`: argv arrays, unset stages are no-ops
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StageCommands {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sign: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attest: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publish: Option<Vec<String>>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
  /// debug, info, warn, error
  #[serde(default = "default_log_level")]
  pub level: String,
  /// auto, text, json
  #[serde(default = "default_log_format")]
  pub format: String,
  /// stderr, stdout
  #[serde(default = "default_log_output")]
  pub output: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_log_format() -> String {
  "auto".to_string()
}

fn default_log_output() -> String {
  "stderr".to_string()
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      format: default_log_format(),
      output: default_log_output(),
    }
  }
}

pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

impl LoggingConfig {
  /// Copy with invalid values replaced by defaults
  pub fn normalized(&self) -> Self {
    let pick = |value: &str, allowed: &[&str], fallback: fn() -> String| {
      if allowed.contains(&value) {
        value.to_string()
      } else {
        fallback()
      }
    };
    Self {
      level: pick(&self.level, &LOG_LEVELS, default_log_level),
      format: pick(&self.format, &["auto", "text", "json"], default_log_format),
      output: pick(&self.output, &["stderr", "stdout"], default_log_output),
    }
  }
}

fn parse_change_types(field: &str, names: &[String]) -> Result<Vec<ChangeType>, ConfigError> {
  names
    .iter()
    .map(|name| {
      name.parse::<ChangeType>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: name.clone(),
        expected: format!(
          "one of {}",
          ChangeType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        ),
      })
    })
    .collect()
}

impl ShipConfig {
  /// Find config file in search order: shiprail.toml, .shiprail.toml, .config/shiprail.toml
  pub fn find_config_path(root: &Path) -> Option<PathBuf> {
    SEARCH_PATHS.iter().map(|p| root.join(p)).find(|p| p.exists())
  }

  /// Load config. An explicit path must exist; otherwise the search paths are tried and
  /// built-in defaults are used when none exists.
  pub fn load(root: &Path, explicit: Option<&Path>) -> ShipResult<Self> {
    let path = match explicit {
      Some(path) if !path.exists() => {
        return Err(ShipError::Config(ConfigError::NotFound {
          path: path.to_path_buf(),
        }));
      }
      Some(path) => path.to_path_buf(),
      None => match Self::find_config_path(root) {
        Some(path) => path,
        None => {
          tracing::debug!(root = %root.display(), "no config file found, using defaults");
          return Ok(Self::default());
        }
      },
    };

    let content =
      fs::read_to_string(&path).with_context(|| format!("Failed to read config from {}", path.display()))?;
    let mut config =
      Self::from_toml_str(&content).with_context(|| format!("Invalid config in {}", path.display()))?;
    config.source = Some(path);
    Ok(config)
  }

  /// Parse and validate config text
  pub fn from_toml_str(content: &str) -> ShipResult<Self> {
    let config: ShipConfig = toml_edit::de::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Save config as pretty TOML
  pub fn save(&self, path: &Path) -> ShipResult<()> {
    let content = toml_edit::ser::to_string_pretty(self).context("Failed to serialize config to TOML")?;
    fs::write(path, content).with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
  }

  /// Fail on the first semantic problem
  pub fn validate(&self) -> ShipResult<()> {
    match self.problems().into_iter().next() {
      Some(problem) => Err(ShipError::Config(problem)),
      None => Ok(()),
    }
  }

  /// Every semantic problem in the config
  pub fn problems(&self) -> Vec<ConfigError> {
    let mut problems = Vec::new();

    if self.version != CONFIG_VERSION {
      problems.push(ConfigError::UnsupportedVersion { found: self.version });
    }
    if let Err(e) = self.initial_version() {
      problems.push(e);
    }
    if let Err(e) = self.pre_1_0_policy() {
      problems.push(e);
    }
    for (field, names) in [
      ("release.bump.major", &self.release.bump.major),
      ("release.bump.minor", &self.release.bump.minor),
      ("release.bump.patch", &self.release.bump.patch),
      ("changelog.include_types", &self.changelog.include_types),
    ] {
      if let Err(e) = parse_change_types(field, names) {
        problems.push(e);
      }
    }
    if let Err(e) = self.section_order() {
      problems.push(e);
    }
    // [logging] is normalized at startup, never rejected
    problems
  }

  pub fn initial_version(&self) -> Result<SemanticVersion, ConfigError> {
    SemanticVersion::parse(&self.release.initial_version).map_err(|_| ConfigError::InvalidValue {
      field: "release.initial_version".to_string(),
      value: self.release.initial_version.clone(),
      expected: "a MAJOR.MINOR.PATCH version".to_string(),
    })
  }

  fn pre_1_0_policy(&self) -> Result<Pre1BreakingPolicy, ConfigError> {
    match self.release.pre_1_0_breaking.as_str() {
      "minor" => Ok(Pre1BreakingPolicy::Minor),
      "major" => Ok(Pre1BreakingPolicy::Major),
      other => Err(ConfigError::InvalidValue {
        field: "release.pre_1_0_breaking".to_string(),
        value: other.to_string(),
        expected: "minor or major".to_string(),
      }),
    }
  }

  fn section_order(&self) -> Result<Vec<Section>, ConfigError> {
    self
      .changelog
      .section_order
      .iter()
      .map(|name| {
        name.parse::<Section>().map_err(|_| ConfigError::InvalidValue {
          field: "changelog.section_order".to_string(),
          value: name.clone(),
          expected: "breaking or a change type".to_string(),
        })
      })
      .collect()
  }

  pub fn bump_policy(&self) -> ShipResult<BumpPolicy> {
    let bump = &self.release.bump;
    Ok(BumpPolicy {
      major: parse_change_types("release.bump.major", &bump.major)?,
      minor: parse_change_types("release.bump.minor", &bump.minor)?,
      patch: parse_change_types("release.bump.patch", &bump.patch)?,
      pre_1_0_breaking: self.pre_1_0_policy()?,
    })
  }

  pub fn classifier(&self) -> Classifier {
    Classifier::new(self.commits.min_description_length)
  }

  pub fn changelog_builder(&self) -> ShipResult<ChangelogBuilder> {
    Ok(ChangelogBuilder::with_order(&self.section_order()?))
  }

  /// Everything the release orchestrator is evaluated under
  pub fn orchestrator_settings(&self) -> ShipResult<OrchestratorSettings> {
    Ok(OrchestratorSettings {
      policy: self.bump_policy()?,
      changelog: self.changelog_builder()?,
      include_types: parse_change_types("changelog.include_types", &self.changelog.include_types)?,
      initial_version: self.initial_version()?,
      tag_prefix: self.release.tag_prefix.clone(),
    })
  }
}

/// One finding of `config validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<usize>,
  pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
}

/// Full report over a config file
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
  pub valid: bool,
  pub path: PathBuf,
  pub errors: Vec<ValidationIssue>,
  pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
  fn new(path: &Path) -> Self {
    Self {
      valid: true,
      path: path.to_path_buf(),
      errors: Vec::new(),
      warnings: Vec::new(),
    }
  }

  fn error(&mut self, message: impl Into<String>) {
    self.valid = false;
    self.errors.push(ValidationIssue {
      message: message.into(),
      line: None,
      severity: Severity::Error,
    });
  }

  /// Treat warnings as errors
  pub fn promote_warnings(&mut self) {
    for mut warning in self.warnings.drain(..) {
      warning.severity = Severity::Error;
      self.errors.push(warning);
    }
    self.valid = self.errors.is_empty();
  }

  /// Validate the file at `path`. I/O problems are findings, not errors.
  pub fn for_file(path: &Path) -> Self {
    let mut report = Self::new(path);
    match fs::read_to_string(path) {
      Ok(content) => report.check_content(&content),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        report.error(format!("config file not found: {}", path.display()));
      }
      Err(e) => report.error(format!("cannot read {}: {}", path.display(), e)),
    }
    report
  }

  fn check_content(&mut self, content: &str) {
    if content.trim().is_empty() {
      self.error("config file is empty");
      return;
    }

    let doc = match content.parse::<toml_edit::DocumentMut>() {
      Ok(doc) => doc,
      Err(e) => {
        self.error(format!("invalid TOML: {}", e.message()));
        return;
      }
    };

    for (key, _) in doc.iter() {
      if !KNOWN_KEYS.contains(&key) {
        self.warnings.push(ValidationIssue {
          message: format!("unknown key \"{}\"", key),
          line: find_key_line(content, key),
          severity: Severity::Warning,
        });
      }
    }

    match doc.get("version") {
      None => self.error("missing required key \"version\""),
      Some(item) => match item.as_integer() {
        Some(CONFIG_VERSION) => {}
        Some(found) => self.error(ConfigError::UnsupportedVersion { found }.to_string()),
        None => self.error("\"version\" must be an integer"),
      },
    }

    match toml_edit::de::from_str::<ShipConfig>(content) {
      Ok(config) => {
        for problem in config.problems() {
          if !matches!(problem, ConfigError::UnsupportedVersion { .. }) {
            self.error(problem.to_string());
          }
        }
      }
      Err(e) => self.error(format!("invalid config structure: {}", e.message())),
    }
  }
}

/// 1-based line where a top-level key or table header first appears
fn find_key_line(content: &str, key: &str) -> Option<usize> {
  content.lines().position(|line| {
    let line = line.trim_start();
    let header = line
      .strip_prefix("[[")
      .or_else(|| line.strip_prefix('['))
      .map(|rest| rest.trim_start());
    let candidate = header.unwrap_or(line);
    candidate
      .strip_prefix(key)
      .is_some_and(|rest| rest.trim_start().starts_with(['=', ']', '.']))
  })
  .map(|idx| idx + 1)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_defaults_without_file() {
    let temp = TempDir::new().unwrap();
    let config = ShipConfig::load(temp.path(), None).unwrap();
    assert!(config.source.is_none());
    assert_eq!(config.commits.min_description_length, 10);
    assert_eq!(config.changelog.include_types, vec!["perf", "docs"]);
    assert_eq!(config.bump_policy().unwrap(), BumpPolicy::default());
  }

  #[test]
  fn test_search_order() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".config")).unwrap();
    fs::write(temp.path().join(".config/shiprail.toml"), "version = 1\n").unwrap();
    fs::write(temp.path().join(".shiprail.toml"), "version = 1\n").unwrap();
    assert_eq!(
      ShipConfig::find_config_path(temp.path()).unwrap(),
      temp.path().join(".shiprail.toml")
    );
  }

  #[test]
  fn test_explicit_missing_path_is_error() {
    let temp = TempDir::new().unwrap();
    let err = ShipConfig::load(temp.path(), Some(&temp.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, ShipError::Config(ConfigError::NotFound { .. })));
  }

  #[test]
  fn test_full_config_round_trip_to_settings() {
    let config = ShipConfig::from_toml_str(
      r#"
version = 1

[release]
initial_version = "0.3.0"
tag_prefix = "tool@v"
pre_1_0_breaking = "major"

[release.bump]
patch = ["fix", "perf"]

[commits]
min_description_length = 4

[changelog]
section_order = ["fix", "breaking"]
include_types = ["refactor"]
"#,
    )
    .unwrap();

    let settings = config.orchestrator_settings().unwrap();
    assert_eq!(settings.initial_version, SemanticVersion::new(0, 3, 0));
    assert_eq!(settings.tag_prefix, "tool@v");
    assert_eq!(settings.policy.pre_1_0_breaking, Pre1BreakingPolicy::Major);
    assert_eq!(settings.policy.patch, vec![ChangeType::Fix, ChangeType::Perf]);
    assert_eq!(settings.policy.minor, vec![ChangeType::Feat]);
    assert_eq!(settings.include_types, vec![ChangeType::Refactor]);
    assert_eq!(settings.changelog.order()[0], Section::Type(ChangeType::Fix));
  }

  #[test]
  fn test_invalid_values_rejected() {
    assert!(ShipConfig::from_toml_str("version = 1\n[release.bump]\nminor = [\"feature\"]\n").is_err());
    assert!(ShipConfig::from_toml_str("version = 1\n[release]\npre_1_0_breaking = \"sometimes\"\n").is_err());
    assert!(ShipConfig::from_toml_str("version = 1\n[changelog]\nsection_order = [\"misc\"]\n").is_err());
    assert!(ShipConfig::from_toml_str("version = 2\n").is_err());
  }

  #[test]
  fn test_logging_normalized() {
    let logging = LoggingConfig {
      level: "verbose".into(),
      format: "json".into(),
      output: "file".into(),
    };
    let normalized = logging.normalized();
    assert_eq!(normalized.level, "info");
    assert_eq!(normalized.format, "json");
    assert_eq!(normalized.output, "stderr");
  }

  #[test]
  fn test_validation_report_unknown_key_line() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("shiprail.toml");
    fs::write(&path, "version = 1\n\n[telemetry]\nenabled = true\n").unwrap();

    let mut report = ValidationReport::for_file(&path);
    assert!(report.valid);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].line, Some(3));

    report.promote_warnings();
    assert!(!report.valid);
    assert_eq!(report.errors[0].severity, Severity::Error);
  }

  #[test]
  fn test_validation_report_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("shiprail.toml");

    fs::write(&path, "").unwrap();
    assert_eq!(ValidationReport::for_file(&path).errors[0].message, "config file is empty");

    fs::write(&path, "[release]\ntag_prefix = \"v\"\n").unwrap();
    let report = ValidationReport::for_file(&path);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.message.contains("missing required key")));

    fs::write(&path, "version = 3\n").unwrap();
    let report = ValidationReport::for_file(&path);
    assert!(report.errors.iter().any(|e| e.message.contains("Unsupported config version: 3")));

    fs::write(&path, "version = = 1").unwrap();
    assert!(ValidationReport::for_file(&path).errors[0].message.starts_with("invalid TOML"));

    let missing = ValidationReport::for_file(&temp.path().join("absent.toml"));
    assert!(missing.errors[0].message.contains("not found"));
  }
}
