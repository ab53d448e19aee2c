//! Integration tests for `shiprail publish`

use crate::helpers::{TestWorkspace, run_shiprail, run_shiprail_json, shiprail_raw};
use anyhow::Result;

const CONFIG: &str = r#"version = 1

[publish]
artifacts_dir = "dist"

[publish.stages]
build = ["sh", "-c", 'mkdir -p dist && echo bin > dist/app.tar.gz && echo run >> build.log && echo dist/app.tar.gz']
sign = ["sh", "-c", 'test -f sign-ok']
attest = ["sh", "-c", 'echo "$SHIPRAIL_TAG" > attested.txt']
publish = ["sh", "-c", 'echo "$SHIPRAIL_VERSION" > published.txt']
"#;

/// Workspace with one merged release, 0.1.0
fn released_workspace() -> Result<TestWorkspace> {
  let ws = TestWorkspace::new()?;
  ws.write_config(CONFIG)?;
  run_shiprail(&ws.path, &["ingest", "--change", "feat: add device login flow"])?;
  run_shiprail(&ws.path, &["proposal", "merge", "--id", "rp-0001"])?;
  Ok(ws)
}

#[cfg(unix)]
#[test]
fn test_failed_stage_resumes_on_retry() -> Result<()> {
  let ws = released_workspace()?;

  let output = shiprail_raw(&ws.path, &["publish", "run", "0.1.0", "--json"])?;
  assert_eq!(output.status.code(), Some(2));
  let run: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(run["stage"], "failed");
  assert_eq!(run["failed_stage"], "signing");
  assert_eq!(run["artifacts"][0], "dist/app.tar.gz");

  // the failure is persisted
  let status = run_shiprail_json(&ws.path, &["publish", "status"])?;
  assert_eq!(status[0]["stage"], "failed");
  let run_id = status[0]["id"].as_str().unwrap().to_string();

  // starting again is refused; only retry resumes
  let output = shiprail_raw(&ws.path, &["publish", "run", "0.1.0"])?;
  assert_eq!(output.status.code(), Some(1));

  std::fs::write(ws.path.join("sign-ok"), "")?;
  let run = run_shiprail_json(&ws.path, &["publish", "retry", &run_id])?;
  assert_eq!(run["stage"], "done");
  assert_eq!(run["attempts"], 2);

  // build ran once: retry re-entered at signing
  assert_eq!(ws.read_file("build.log")?.lines().count(), 1);
  assert_eq!(ws.read_file("attested.txt")?.trim(), "v0.1.0");
  assert_eq!(ws.read_file("published.txt")?.trim(), "0.1.0");

  Ok(())
}

#[cfg(unix)]
#[test]
fn test_run_defaults_to_latest_queued() -> Result<()> {
  let ws = released_workspace()?;
  std::fs::write(ws.path.join("sign-ok"), "")?;

  let run = run_shiprail_json(&ws.path, &["publish", "run"])?;
  assert_eq!(run["version"], "0.1.0");
  assert_eq!(run["stage"], "done");

  let stages: Vec<String> = run["history"]
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["to"].as_str().unwrap_or_default().to_string())
    .collect();
  assert_eq!(stages, vec!["building", "signing", "attesting", "publishing", "done"]);

  // nothing left to start
  let output = shiprail_raw(&ws.path, &["publish", "run"])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_unknown_run_is_reported() -> Result<()> {
  let ws = TestWorkspace::new()?;

  let output = shiprail_raw(&ws.path, &["publish", "retry", "0123456789ab"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown publish run"));

  Ok(())
}
