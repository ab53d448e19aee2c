//! `shiprail config`: validate, show and scaffold shiprail.toml

use crate::core::config::{SEARCH_PATHS, Severity, ShipConfig, ValidationIssue, ValidationReport};
use crate::core::context::WorkspaceContext;
use crate::core::error::{ResultExt, ShipError, ShipResult};
use crate::ui::output::{OutputFormat, print_output};
use serde::Serialize;
use std::fmt::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct InitReport {
  path: String,
}

/// Validate a config file and report every error and warning
pub fn run_config_validate(
  ctx: &WorkspaceContext,
  file: Option<PathBuf>,
  strict: bool,
  format: OutputFormat,
) -> ShipResult<()> {
  let path = file
    .or_else(|| ctx.config.source.clone())
    .or_else(|| ShipConfig::find_config_path(&ctx.root))
    .unwrap_or_else(|| ctx.root.join(SEARCH_PATHS[0]));

  let mut report = ValidationReport::for_file(&path);
  if strict {
    report.promote_warnings();
  }

  print_output(format, &report, |out| render_report(out, &report))?;

  if report.valid {
    Ok(())
  } else {
    Err(ShipError::with_help(
      format!("{} is invalid ({} error(s))", path.display(), report.errors.len()),
      "Fix the errors above, then run `shiprail config validate` again",
    ))
  }
}

/// Print the effective configuration
pub fn run_config_show(ctx: &WorkspaceContext, format: OutputFormat) -> ShipResult<()> {
  let content = if format.is_text() {
    toml_edit::ser::to_string_pretty(&ctx.config).context("Failed to serialize config to TOML")?
  } else {
    String::new()
  };
  print_output(format, &ctx.config, |out| {
    match &ctx.config.source {
      Some(path) => writeln!(out, "# source: {}", path.display())?,
      None => writeln!(out, "# source: built-in defaults")?,
    }
    out.write_str(&content)
  })
}

/// Write a default shiprail.toml at the workspace root
pub fn run_config_init(ctx: &WorkspaceContext, force: bool, format: OutputFormat) -> ShipResult<()> {
  if let Some(existing) = ShipConfig::find_config_path(&ctx.root)
    && !force
  {
    return Err(ShipError::with_help(
      format!("Configuration already exists: {}", existing.display()),
      "Pass --force to overwrite it",
    ));
  }

  let path = ctx.root.join(SEARCH_PATHS[0]);
  ShipConfig::default().save(&path)?;

  let written = InitReport {
    path: path.display().to_string(),
  };
  print_output(format, &written, |out| {
    writeln!(out, "✅ Wrote {}", written.path)?;
    writeln!(out)?;
    writeln!(out, "Next steps:")?;
    writeln!(out, "  Configure [publish.stages] commands")?;
    writeln!(out, "  shiprail config validate")
  })
}

fn render_report(out: &mut String, report: &ValidationReport) -> fmt::Result {
  if report.valid {
    writeln!(out, "✅ {} is valid", report.path.display())?;
  } else {
    writeln!(out, "❌ {} is invalid", report.path.display())?;
  }
  for issue in report.errors.iter().chain(&report.warnings) {
    writeln!(out, "   {}", format_issue(issue))?;
  }
  Ok(())
}

fn format_issue(issue: &ValidationIssue) -> String {
  let label = match issue.severity {
    Severity::Error => "error",
    Severity::Warning => "warning",
  };
  match issue.line {
    Some(line) => format!("{} (line {}): {}", label, line, issue.message),
    None => format!("{}: {}", label, issue.message),
  }
}
