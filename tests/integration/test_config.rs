//! Integration tests for `shiprail config` and `shiprail meta`

use crate::helpers::{TestWorkspace, run_shiprail, run_shiprail_json, shiprail_raw};
use anyhow::Result;

#[test]
fn test_config_init_writes_valid_config() -> Result<()> {
  let ws = TestWorkspace::new()?;

  run_shiprail(&ws.path, &["config", "init"])?;
  assert!(ws.file_exists("shiprail.toml"));
  assert!(ws.read_file("shiprail.toml")?.contains("version = 1"));

  run_shiprail(&ws.path, &["config", "validate"])?;

  // refuses to overwrite without --force
  let output = shiprail_raw(&ws.path, &["config", "init"])?;
  assert_eq!(output.status.code(), Some(1));
  run_shiprail(&ws.path, &["config", "init", "--force"])?;

  Ok(())
}

#[test]
fn test_validate_reports_unknown_key_with_line() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_config("version = 1\n\n[release]\ntag_prefix = \"v\"\n\n[extras]\nflag = true\n")?;

  let output = run_shiprail(&ws.path, &["config", "validate", "--output", "json"])?;
  let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(report["valid"], true);
  assert_eq!(report["warnings"][0]["line"], 6);

  // strict turns the warning into a failure
  let output = shiprail_raw(&ws.path, &["config", "validate", "--strict"])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_validate_runs_on_broken_config() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.write_config("version = 2\n\n[release.bump]\nminor = [\"feature\"]\n")?;

  let output = shiprail_raw(&ws.path, &["config", "validate", "--output", "json"])?;
  assert_eq!(output.status.code(), Some(1));
  let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(report["valid"], false);
  let errors = report["errors"].as_array().unwrap();
  assert_eq!(errors.len(), 2);

  // other commands refuse to run on it
  let output = shiprail_raw(&ws.path, &["proposal", "show"])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_meta_env_lists_config_sources() -> Result<()> {
  let ws = TestWorkspace::new()?;
  std::fs::create_dir_all(ws.path.join(".config"))?;
  std::fs::write(ws.path.join(".config/shiprail.toml"), "version = 1\n")?;

  let env = run_shiprail_json(&ws.path, &["meta", "env"])?;
  assert!(env["config_path"].as_str().unwrap().ends_with(".config/shiprail.toml"));
  assert_eq!(env["config_sources"].as_array().unwrap().len(), 3);
  assert_eq!(env["config_sources"][2]["exists"], true);
  assert_eq!(env["git_head"].as_str().unwrap().len(), 40);

  let info = run_shiprail_json(&ws.path, &["meta", "info"])?;
  assert_eq!(info["name"], "shiprail");

  Ok(())
}
