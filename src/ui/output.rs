//! Command output in the format picked with `-o/--output`
//!
//! Every command builds one serializable payload. `text` renders it for a
//! terminal; `json` and `yaml` serialize the payload as-is.

use crate::core::error::ShipResult;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

/// Output format shared by all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  /// Human-readable text
  #[default]
  Text,
  /// Pretty-printed JSON
  Json,
  /// YAML
  Yaml,
}

impl OutputFormat {
  pub fn is_text(self) -> bool {
    self == OutputFormat::Text
  }
}

impl fmt::Display for OutputFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OutputFormat::Text => write!(f, "text"),
      OutputFormat::Json => write!(f, "json"),
      OutputFormat::Yaml => write!(f, "yaml"),
    }
  }
}

/// Render `payload`; `render_text` is only called for [`OutputFormat::Text`].
/// The result always ends with a newline unless it is empty.
pub fn render_output<T, F>(format: OutputFormat, payload: &T, render_text: F) -> ShipResult<String>
where
  T: Serialize + ?Sized,
  F: FnOnce(&mut String) -> fmt::Result,
{
  let mut out = match format {
    OutputFormat::Text => {
      let mut text = String::new();
      render_text(&mut text)?;
      text
    }
    OutputFormat::Json => serde_json::to_string_pretty(payload)?,
    OutputFormat::Yaml => serde_yaml::to_string(payload)?,
  };
  if !out.is_empty() && !out.ends_with('\n') {
    out.push('\n');
  }
  Ok(out)
}

/// Render and write to stdout
pub fn print_output<T, F>(format: OutputFormat, payload: &T, render_text: F) -> ShipResult<()>
where
  T: Serialize + ?Sized,
  F: FnOnce(&mut String) -> fmt::Result,
{
  print!("{}", render_output(format, payload, render_text)?);
  Ok(())
}
