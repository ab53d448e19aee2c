//! Integration tests for `shiprail classify`, `next-version` and `changelog`

use crate::helpers::{TestWorkspace, run_shiprail, run_shiprail_json, shiprail_raw};
use anyhow::Result;

#[test]
fn test_classify_json_reports_descriptor() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let items = run_shiprail_json(&ws.path, &["classify", "feat(auth)!: add device login flow"])?;
  let item = &items[0];
  assert_eq!(item["status"], "classified");
  assert_eq!(item["descriptor"]["type"], "feat");
  assert_eq!(item["descriptor"]["scope"], "auth");
  assert_eq!(item["descriptor"]["breaking"], true);
  assert_eq!(item["descriptor"]["description"], "add device login flow");

  Ok(())
}

#[test]
fn test_classify_rejection_exits_with_validation_code() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let output = shiprail_raw(
    &ws.path,
    &["classify", "--json", "fix: handle empty tag list", "feat add thing without colon"],
  )?;
  assert_eq!(output.status.code(), Some(3));

  // the good item is still reported
  let items: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(items[0]["status"], "classified");
  assert_eq!(items[1]["status"], "rejected");
  assert_eq!(items[1]["reason"], "missing-separator");

  Ok(())
}

#[test]
fn test_short_description_is_a_warning() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let items = run_shiprail_json(&ws.path, &["classify", "fix: typo"])?;
  assert_eq!(items[0]["status"], "classified");
  assert_eq!(items[0]["warnings"][0]["kind"], "short_description");

  Ok(())
}

#[test]
fn test_next_version_pre_1_0_breaking_is_minor() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let report = run_shiprail_json(
    &ws.path,
    &["next-version", "--current", "0.4.2", "--change", "feat!: drop legacy token format"],
  )?;
  assert_eq!(report["next"], "0.5.0");
  assert_eq!(report["bump"], true);

  Ok(())
}

#[test]
fn test_next_version_without_signal_is_unchanged() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let report = run_shiprail_json(
    &ws.path,
    &[
      "next-version",
      "--current",
      "1.2.3",
      "--change",
      "docs: explain proposal lifecycle",
      "--change",
      "chore: bump ci runner image",
    ],
  )?;
  assert_eq!(report["next"], "1.2.3");
  assert_eq!(report["bump"], false);

  Ok(())
}

#[test]
fn test_changelog_sections_in_order() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let output = run_shiprail(
    &ws.path,
    &[
      "changelog",
      "--version",
      "1.2.0",
      "--change",
      "fix: fix token refresh race",
      "--change",
      "feat(auth): add OAuth device flow",
    ],
  )?;
  let text = String::from_utf8_lossy(&output.stdout);
  assert!(text.starts_with("## [1.2.0]\n"));
  let features = text.find("### Features").unwrap();
  let fixes = text.find("### Bug Fixes").unwrap();
  assert!(features < fixes);
  assert!(text.contains("- **auth:** add OAuth device flow"));

  Ok(())
}

#[test]
fn test_yaml_output_and_format_conflict() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let output = run_shiprail(
    &ws.path,
    &["next-version", "--current", "1.4.2", "--change", "fix: handle empty tag list", "-o", "yaml"],
  )?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("current: 1.4.2"));
  assert!(stdout.contains("next: 1.4.3"));
  assert!(stdout.contains("bump: true"));

  let output = shiprail_raw(&ws.path, &["meta", "info", "--json", "--output", "yaml"])?;
  assert_eq!(output.status.code(), Some(2));

  let output = shiprail_raw(&ws.path, &["meta", "info", "--output", "xml"])?;
  assert!(!output.status.success());

  Ok(())
}

#[test]
fn test_next_version_overflow_is_reported() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let output = shiprail_raw(
    &ws.path,
    &["next-version", "--current", "18446744073709551615.0.0", "--change", "feat!: replace the plugin interface"],
  )?;
  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("maximum"));
  assert!(!stderr.contains("panicked"));

  Ok(())
}
