//! Tracing setup for the shiprail binary
//!
//! Resolution order per setting: command-line flag (or its env var), then the
//! `[logging]` table of the config, then the built-in default. `RUST_LOG`
//! overrides the level filter entirely when set.

use crate::core::config::{LOG_LEVELS, LoggingConfig};
use crate::core::error::{ConfigError, ShipError, ShipResult};
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Resolved logging setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
  pub level: Level,
  pub json: bool,
  pub to_stdout: bool,
}

/// Parse a level name as accepted on the command line
pub fn parse_level(value: &str) -> ShipResult<Level> {
  match value.to_ascii_lowercase().as_str() {
    "debug" => Ok(Level::DEBUG),
    "info" => Ok(Level::INFO),
    "warn" => Ok(Level::WARN),
    "error" => Ok(Level::ERROR),
    _ => Err(ShipError::Config(ConfigError::InvalidValue {
      field: "--log-level".to_string(),
      value: value.to_string(),
      expected: LOG_LEVELS.join(", "),
    })),
  }
}

impl LogSettings {
  /// Merge CLI overrides over the (normalized) config section.
  /// Bad CLI values are errors; bad config values already fell back to defaults.
  pub fn resolve(config: &LoggingConfig, cli_level: Option<&str>, cli_format: Option<&str>) -> ShipResult<Self> {
    let config = config.normalized();

    let level = parse_level(cli_level.unwrap_or(&config.level))?;
    let to_stdout = config.output == "stdout";

    let format = cli_format.unwrap_or(&config.format);
    let json = match format {
      "json" => true,
      "text" => false,
      "auto" => {
        let tty = if to_stdout {
          std::io::stdout().is_terminal()
        } else {
          std::io::stderr().is_terminal()
        };
        !tty
      }
      other => {
        return Err(ShipError::Config(ConfigError::InvalidValue {
          field: "--log-format".to_string(),
          value: other.to_string(),
          expected: "auto, text, json".to_string(),
        }));
      }
    };

    Ok(Self { level, json, to_stdout })
  }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_tracing(settings: LogSettings) {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

  let writer = if settings.to_stdout {
    BoxMakeWriter::new(std::io::stdout)
  } else {
    BoxMakeWriter::new(std::io::stderr)
  };

  if settings.json {
    tracing_subscriber::registry()
      .with(env_filter)
      .with(fmt::layer().with_target(false).with_writer(writer).json())
      .try_init()
      .ok();
  } else {
    tracing_subscriber::registry()
      .with(env_filter)
      .with(fmt::layer().with_target(false).with_writer(writer))
      .try_init()
      .ok();
  }
}
