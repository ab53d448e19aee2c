//! Integration tests for `shiprail ingest` and `shiprail proposal`

use crate::helpers::{TestWorkspace, run_shiprail, run_shiprail_json, shiprail_raw};
use anyhow::Result;

#[test]
fn test_ingest_opens_and_updates_proposal() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let report = run_shiprail_json(
    &ws.path,
    &["ingest", "--change", "feat(auth): add device login flow", "--ref", "abc1234"],
  )?;
  assert_eq!(report["outcomes"][0]["outcome"], "proposal_opened");
  assert_eq!(report["outcomes"][0]["proposal_id"], "rp-0001");
  assert_eq!(report["outcomes"][0]["version"], "0.1.0");

  // same ref again is a no-op
  let report = run_shiprail_json(
    &ws.path,
    &["ingest", "--change", "feat(auth): add device login flow", "--ref", "abc1234"],
  )?;
  assert_eq!(report["outcomes"][0]["outcome"], "duplicate");

  let report = run_shiprail_json(
    &ws.path,
    &["ingest", "--change", "fix: handle empty tag list", "--ref", "def5678"],
  )?;
  assert_eq!(report["outcomes"][0]["outcome"], "proposal_updated");
  assert_eq!(report["outcomes"][0]["revision"], 2);
  assert_eq!(report["outcomes"][0]["version"], "0.1.0");

  let view = run_shiprail_json(&ws.path, &["proposal", "show"])?;
  assert_eq!(view["pending"]["id"], "rp-0001");
  assert_eq!(view["pending"]["accumulated_changes"].as_array().unwrap().len(), 2);
  assert!(view["pending"]["changelog_text"].as_str().unwrap().starts_with("## [0.1.0]"));

  Ok(())
}

#[test]
fn test_non_qualifying_change_opens_nothing() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let report = run_shiprail_json(&ws.path, &["ingest", "--change", "chore: bump ci runner image"])?;
  assert_eq!(report["outcomes"][0]["outcome"], "recorded");

  let view = run_shiprail_json(&ws.path, &["proposal", "show"])?;
  assert!(view["pending"].is_null());
  assert_eq!(view["unreleased"], 1);

  Ok(())
}

#[test]
fn test_merge_releases_and_queues_publish_run() -> Result<()> {
  let ws = TestWorkspace::new()?;
  run_shiprail(&ws.path, &["ingest", "--change", "feat: add device login flow", "--ref", "abc1234"])?;

  // a stale id is refused and changes nothing
  let output = shiprail_raw(&ws.path, &["proposal", "merge", "--id", "rp-0009"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(ws.state()?["releases"].as_array().unwrap().is_empty());

  let report = run_shiprail_json(
    &ws.path,
    &["proposal", "merge", "--id", "rp-0001", "--write-changelog"],
  )?;
  assert_eq!(report["release"]["version"], "0.1.0");
  assert_eq!(report["release"]["tag"], "v0.1.0");
  assert_eq!(report["publish_run"].as_str().unwrap().len(), 12);

  let changelog = ws.read_file("CHANGELOG.md")?;
  assert!(changelog.starts_with("# Changelog"));
  assert!(changelog.contains("## [0.1.0] - "));
  assert!(changelog.contains("- add device login flow (abc1234)"));

  let state = ws.state()?;
  assert_eq!(state["last_released"], "0.1.0");
  assert!(state["unreleased"].as_array().unwrap().is_empty());
  assert_eq!(state["publish_runs"][0]["stage"], "queued");

  // a second merge has nothing to act on
  let output = shiprail_raw(&ws.path, &["proposal", "merge", "--id", "rp-0001"])?;
  assert_eq!(output.status.code(), Some(3));

  Ok(())
}

#[test]
fn test_close_reopens_and_cancel_discards() -> Result<()> {
  let ws = TestWorkspace::new()?;
  run_shiprail(&ws.path, &["ingest", "--change", "feat: add device login flow"])?;

  let outcome = run_shiprail_json(
    &ws.path,
    &["proposal", "close", "--id", "rp-0001", "--reason", "base branch moved"],
  )?;
  assert_eq!(outcome["closed"], "rp-0001");
  assert_eq!(outcome["reopened"], "rp-0002");

  run_shiprail(&ws.path, &["proposal", "cancel", "--id", "rp-0002"])?;
  let view = run_shiprail_json(&ws.path, &["proposal", "show"])?;
  assert!(view["pending"].is_null());
  assert_eq!(view["unreleased"], 1);

  // the next qualifying change reopens over everything unreleased
  let report = run_shiprail_json(&ws.path, &["ingest", "--change", "fix: handle empty tag list"])?;
  assert_eq!(report["outcomes"][0]["outcome"], "proposal_opened");
  assert_eq!(report["outcomes"][0]["proposal_id"], "rp-0003");
  assert_eq!(report["outcomes"][0]["version"], "0.1.0");

  Ok(())
}

#[test]
fn test_manual_ingest_builds_on_release_tag() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.tag("v1.2.0")?;

  let report = run_shiprail_json(&ws.path, &["ingest", "--change", "feat: add device login flow"])?;
  assert_eq!(report["outcomes"][0]["outcome"], "proposal_opened");
  assert_eq!(report["outcomes"][0]["version"], "1.3.0");

  let view = run_shiprail_json(&ws.path, &["proposal", "show"])?;
  assert_eq!(view["pending"]["base_version"], "1.2.0");
  assert_eq!(view["last_released"], "1.2.0");

  Ok(())
}

#[test]
fn test_existing_tag_is_a_version_conflict() -> Result<()> {
  let ws = TestWorkspace::new()?;
  run_shiprail(&ws.path, &["ingest", "--change", "feat: add device login flow", "--ref", "abc1234"])?;
  run_shiprail(&ws.path, &["proposal", "merge", "--id", "rp-0001"])?;

  // someone tagged the next minor by hand
  ws.tag("v0.2.0")?;

  let output = shiprail_raw(
    &ws.path,
    &["ingest", "--change", "feat: add json output", "--ref", "def5678"],
  )?;
  assert_eq!(output.status.code(), Some(3));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("v0.2.0"));

  let view = run_shiprail_json(&ws.path, &["proposal", "show"])?;
  assert!(view["pending"].is_null());
  assert_eq!(view["last_released"], "0.1.0");

  Ok(())
}

#[test]
fn test_ingest_from_git_since_latest_tag() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.tag("v1.0.0")?;
  ws.commit("feat: add device login flow")?;
  ws.commit("update readme wording")?;
  let fix_sha = ws.commit("fix: handle empty tag list")?;

  let report = run_shiprail_json(&ws.path, &["ingest", "--from-git"])?;
  let outcomes = report["outcomes"].as_array().unwrap();
  assert_eq!(outcomes.len(), 2);
  assert_eq!(outcomes[0]["outcome"], "proposal_opened");
  assert_eq!(outcomes[0]["version"], "1.1.0");
  assert_eq!(report["rejected"][0]["reason"], "unknown-type");

  let state = ws.state()?;
  assert_eq!(state["unreleased"][1]["source_ref"], fix_sha.as_str());

  // re-running picks up nothing new
  let report = run_shiprail_json(&ws.path, &["ingest", "--from-git"])?;
  for outcome in report["outcomes"].as_array().unwrap() {
    assert_eq!(outcome["outcome"], "duplicate");
  }

  Ok(())
}

#[test]
fn test_held_lock_blocks_ingest() -> Result<()> {
  let ws = TestWorkspace::new()?;
  std::fs::create_dir_all(ws.path.join(".shiprail"))?;
  std::fs::write(ws.path.join(".shiprail/state.lock"), "12345\n")?;

  let output = shiprail_raw(&ws.path, &["ingest", "--change", "feat: add device login flow"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(!ws.file_exists(".shiprail/state.json"));

  Ok(())
}
