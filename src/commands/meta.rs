//! `shiprail meta`: build metadata and resolved environment

use crate::core::config::{SEARCH_PATHS, ShipConfig};
use crate::core::context::WorkspaceContext;
use crate::core::error::ShipResult;
use crate::ui::output::{OutputFormat, print_output};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// Environment variables that change shiprail's behavior
const RELEVANT_ENV: [&str; 3] = ["SHIPRAIL_CONFIG", "SHIPRAIL_LOG_LEVEL", "RUST_LOG"];

#[derive(Debug, Serialize)]
struct BuildInfo {
  name: &'static str,
  version: &'static str,
  commit: &'static str,
  build_time: &'static str,
  platform: String,
}

impl BuildInfo {
  fn current() -> Self {
    Self {
      name: env!("CARGO_PKG_NAME"),
      version: env!("CARGO_PKG_VERSION"),
      commit: option_env!("SHIPRAIL_BUILD_COMMIT").unwrap_or("unknown"),
      build_time: option_env!("SHIPRAIL_BUILD_TIME").unwrap_or("unknown"),
      platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
    }
  }
}

#[derive(Debug, Serialize)]
struct ConfigSource {
  path: String,
  exists: bool,
}

#[derive(Debug, Serialize)]
struct EnvInfo {
  workspace_root: String,
  config_path: Option<String>,
  config_sources: Vec<ConfigSource>,
  state_path: String,
  git_work_tree: Option<String>,
  git_head: Option<String>,
  home_dir: Option<String>,
  env: BTreeMap<&'static str, Option<String>>,
}

/// Print build metadata
pub fn run_meta_info(format: OutputFormat) -> ShipResult<()> {
  let info = BuildInfo::current();
  print_output(format, &info, |out| {
    writeln!(out, "📦 {} {}", info.name, info.version)?;
    writeln!(out, "   commit:     {}", info.commit)?;
    writeln!(out, "   built:      {}", info.build_time)?;
    writeln!(out, "   platform:   {}", info.platform)
  })
}

/// Print where configuration and state are resolved from
pub fn run_meta_env(ctx: &WorkspaceContext, format: OutputFormat) -> ShipResult<()> {
  let git = ctx.git().ok();
  let info = EnvInfo {
    workspace_root: ctx.root.display().to_string(),
    config_path: ctx
      .config
      .source
      .clone()
      .or_else(|| ShipConfig::find_config_path(&ctx.root))
      .map(|p| p.display().to_string()),
    config_sources: SEARCH_PATHS
      .iter()
      .map(|p| {
        let path = ctx.root.join(p);
        ConfigSource {
          exists: path.exists(),
          path: path.display().to_string(),
        }
      })
      .collect(),
    state_path: ctx.store.state_path().display().to_string(),
    git_work_tree: git.as_ref().map(|g| g.work_tree().display().to_string()),
    git_head: git.as_ref().and_then(|g| g.head_commit().ok()),
    home_dir: std::env::var("HOME").ok(),
    env: RELEVANT_ENV.iter().map(|k| (*k, std::env::var(k).ok())).collect(),
  };

  print_output(format, &info, |out| render_env(out, &info))
}

fn render_env(out: &mut String, info: &EnvInfo) -> fmt::Result {
  writeln!(out, "📂 Workspace: {}", info.workspace_root)?;
  writeln!(
    out,
    "⚙️  Config:    {}",
    info.config_path.as_deref().unwrap_or("(built-in defaults)")
  )?;
  writeln!(out, "   Search order:")?;
  for source in &info.config_sources {
    let mark = if source.exists { "✓" } else { " " };
    writeln!(out, "     [{}] {}", mark, source.path)?;
  }
  writeln!(out, "💾 State:     {}", info.state_path)?;
  match (&info.git_work_tree, &info.git_head) {
    (Some(tree), Some(head)) => writeln!(out, "🌿 Git:       {} @ {}", tree, &head[..head.len().min(12)])?,
    (Some(tree), None) => writeln!(out, "🌿 Git:       {} (no commits)", tree)?,
    _ => writeln!(out, "🌿 Git:       (not a repository)")?,
  }
  writeln!(out, "🌍 Environment:")?;
  for (key, value) in &info.env {
    writeln!(out, "   {}={}", key, value.as_deref().unwrap_or(""))?;
  }
  Ok(())
}
