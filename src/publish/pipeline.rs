//! Resumable build → sign → attest → publish state machine
//!
//! The pipeline only orders stages and propagates failure; the stages
//! themselves are delegated to a [`StageExecutor`]. A failed run remembers
//! the stage it failed in and [`PublishPipeline::retry`] re-enters there,
//! never at `queued`.

use crate::core::error::{PublishStageError, ShipError, ShipResult};
use crate::release::orchestrator::ReleaseRecord;
use crate::release::version::SemanticVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Run identifier: SHA-256 of `publish:<version>`, so one run per version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
  pub fn for_version(version: &SemanticVersion) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(format!("publish:{}", version).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    Self(digest[..12].to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for RunId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

impl fmt::Display for RunId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStage {
  Queued,
  Building,
  Signing,
  Attesting,
  Publishing,
  Done,
  Failed,
}

impl PublishStage {
  /// Forward successor in the happy path
  pub fn next(self) -> Option<Self> {
    match self {
      PublishStage::Queued => Some(PublishStage::Building),
      PublishStage::Building => Some(PublishStage::Signing),
      PublishStage::Signing => Some(PublishStage::Attesting),
      PublishStage::Attesting => Some(PublishStage::Publishing),
      PublishStage::Publishing => Some(PublishStage::Done),
      PublishStage::Done | PublishStage::Failed => None,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, PublishStage::Done | PublishStage::Failed)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PublishStage::Queued => "queued",
      PublishStage::Building => "building",
      PublishStage::Signing => "signing",
      PublishStage::Attesting => "attesting",
      PublishStage::Publishing => "publishing",
      PublishStage::Done => "done",
      PublishStage::Failed => "failed",
    }
  }
}

impl fmt::Display for PublishStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
  pub from: PublishStage,
  pub to: PublishStage,
  pub at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}

/// One publish run of a promoted release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRun {
  pub id: RunId,
  pub version: SemanticVersion,
  pub tag: String,
  pub stage: PublishStage,
  /// Where the last failure happened; retry resumes here
  #[serde(default)]
  pub failed_stage: Option<PublishStage>,
  #[serde(default)]
  pub artifacts: BTreeSet<String>,
  #[serde(default)]
  pub attempts: u32,
  #[serde(default)]
  pub last_error: Option<String>,
  #[serde(default)]
  pub history: Vec<StageTransition>,
  pub created_at: DateTime<Utc>,
}

impl PublishRun {
  /// Queue a run for a promoted release
  pub fn queue(record: &ReleaseRecord) -> Self {
    Self {
      id: RunId::for_version(&record.version),
      version: record.version,
      tag: record.tag.clone(),
      stage: PublishStage::Queued,
      failed_stage: None,
      artifacts: BTreeSet::new(),
      attempts: 0,
      last_error: None,
      history: Vec::new(),
      created_at: Utc::now(),
    }
  }

  fn transition(&mut self, to: PublishStage, note: Option<String>) {
    tracing::info!(run = %self.id, from = %self.stage, to = %to, "publish stage transition");
    self.history.push(StageTransition {
      from: self.stage,
      to,
      at: Utc::now(),
      note,
    });
    self.stage = to;
  }

  fn fail(&mut self, at: PublishStage, reason: String) -> ShipError {
    tracing::warn!(run = %self.id, stage = %at, reason = %reason, "publish stage failed");
    self.failed_stage = Some(at);
    self.last_error = Some(reason.clone());
    self.transition(PublishStage::Failed, Some(reason.clone()));
    ShipError::PublishStage(PublishStageError {
      run_id: self.id.to_string(),
      stage: at.to_string(),
      reason,
    })
  }
}

/// Queue a run unless the version already has one
pub fn queue_run(runs: &[PublishRun], record: &ReleaseRecord) -> ShipResult<PublishRun> {
  let run = PublishRun::queue(record);
  if let Some(existing) = runs.iter().find(|r| r.id == run.id) {
    return Err(ShipError::with_help(
      format!(
        "Publish run {} already exists for {} (stage: {})",
        existing.id, existing.version, existing.stage
      ),
      format!("Resume it with `shiprail publish retry {}`", existing.id),
    ));
  }
  Ok(run)
}

/// External collaborators that perform the stages
pub trait StageExecutor {
  /// Build and return the produced artifact identifiers
  fn build(&self, run: &PublishRun) -> ShipResult<BTreeSet<String>>;

  /// Confirm every artifact is present before signing
  fn verify_artifacts(&self, artifacts: &BTreeSet<String>) -> ShipResult<()>;

  fn sign(&self, run: &PublishRun) -> ShipResult<()>;

  fn attest(&self, run: &PublishRun) -> ShipResult<()>;

  fn publish(&self, run: &PublishRun) -> ShipResult<()>;
}

/// Drives runs through the stages with a given executor
pub struct PublishPipeline<'a, E: StageExecutor + ?Sized> {
  executor: &'a E,
}

impl<'a, E: StageExecutor + ?Sized> PublishPipeline<'a, E> {
  pub fn new(executor: &'a E) -> Self {
    Self { executor }
  }

  /// Drive a queued run to `done`, or to `failed` at the first failing stage
  pub fn start(&self, run: &mut PublishRun) -> ShipResult<()> {
    match run.stage {
      PublishStage::Queued => {
        run.attempts += 1;
        run.transition(PublishStage::Building, None);
        self.advance(run)
      }
      PublishStage::Failed => Err(ShipError::with_help(
        format!("Publish run {} is failed", run.id),
        format!("Resume it with `shiprail publish retry {}`", run.id),
      )),
      PublishStage::Done => Err(ShipError::message(format!(
        "Publish run {} is already done",
        run.id
      ))),
      stage => Err(ShipError::message(format!(
        "Publish run {} is already in progress (stage: {})",
        run.id, stage
      ))),
    }
  }

  /// Resume a failed run from the stage it failed in
  pub fn retry(&self, run: &mut PublishRun) -> ShipResult<()> {
    let resume_at = match (run.stage, run.failed_stage) {
      (PublishStage::Failed, Some(stage)) => stage,
      (PublishStage::Failed, None) => PublishStage::Building,
      (stage, _) => {
        return Err(ShipError::message(format!(
          "Only failed runs can be retried; run {} is {}",
          run.id, stage
        )));
      }
    };

    run.attempts += 1;
    run.failed_stage = None;
    run.transition(resume_at, Some(format!("retry attempt {}", run.attempts)));
    self.advance(run)
  }

  fn advance(&self, run: &mut PublishRun) -> ShipResult<()> {
    loop {
      let stage = run.stage;
      let result = match stage {
        PublishStage::Building => self.executor.build(run).and_then(|artifacts| {
          if artifacts.is_empty() {
            return Err(ShipError::message("build produced no artifacts"));
          }
          run.artifacts = artifacts;
          Ok(())
        }),
        PublishStage::Signing => {
          if run.artifacts.is_empty() {
            Err(ShipError::message("no artifacts to sign"))
          } else {
            self
              .executor
              .verify_artifacts(&run.artifacts)
              .and_then(|_| self.executor.sign(run))
          }
        }
        PublishStage::Attesting => self.executor.attest(run),
        PublishStage::Publishing => self.executor.publish(run),
        PublishStage::Done => return Ok(()),
        PublishStage::Queued | PublishStage::Failed => {
          return Err(ShipError::message(format!(
            "Publish run {} cannot advance from {}",
            run.id, stage
          )));
        }
      };

      if let Err(err) = result {
        return Err(run.fail(stage, err.to_string()));
      }
      if let Some(next) = stage.next() {
        run.transition(next, None);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::release::orchestrator::ProposalId;
  use std::cell::RefCell;

  /// Records calls and fails the configured stage while `failures` is non-zero
  #[derive(Default)]
  struct ScriptedExecutor {
    calls: RefCell<Vec<&'static str>>,
    fail_at: Option<&'static str>,
    failures: RefCell<u32>,
    artifacts: Vec<&'static str>,
    missing: Vec<&'static str>,
  }

  impl ScriptedExecutor {
    fn producing(artifacts: &[&'static str]) -> Self {
      Self {
        artifacts: artifacts.to_vec(),
        ..Self::default()
      }
    }

    fn failing(mut self, stage: &'static str, times: u32) -> Self {
      self.fail_at = Some(stage);
      *self.failures.borrow_mut() = times;
      self
    }

    fn step(&self, name: &'static str) -> ShipResult<()> {
      self.calls.borrow_mut().push(name);
      if self.fail_at == Some(name) && *self.failures.borrow() > 0 {
        *self.failures.borrow_mut() -= 1;
        return Err(ShipError::message(format!("{} exited with status 1", name)));
      }
      Ok(())
    }

    fn calls(&self) -> Vec<&'static str> {
      self.calls.borrow().clone()
    }
  }

  impl StageExecutor for ScriptedExecutor {
    fn build(&self, _run: &PublishRun) -> ShipResult<BTreeSet<String>> {
      self.step("build")?;
      Ok(self.artifacts.iter().map(|a| a.to_string()).collect())
    }

    fn verify_artifacts(&self, artifacts: &BTreeSet<String>) -> ShipResult<()> {
      self.step("verify")?;
      match artifacts.iter().find(|a| self.missing.contains(&a.as_str())) {
        Some(missing) => Err(ShipError::message(format!("artifact missing: {}", missing))),
        None => Ok(()),
      }
    }

    fn sign(&self, _run: &PublishRun) -> ShipResult<()> {
      self.step("sign")
    }

    fn attest(&self, _run: &PublishRun) -> ShipResult<()> {
      self.step("attest")
    }

    fn publish(&self, _run: &PublishRun) -> ShipResult<()> {
      self.step("publish")
    }
  }

  fn record(version: &str) -> ReleaseRecord {
    let version = SemanticVersion::parse(version).unwrap();
    ReleaseRecord {
      version,
      tag: format!("v{}", version),
      changelog_text: String::new(),
      source_change_list: Vec::new(),
      proposal_id: ProposalId::from("rp-0001"),
      released_at: Utc::now(),
    }
  }

  #[test]
  fn test_run_id_is_stable_per_version() {
    let a = RunId::for_version(&SemanticVersion::new(1, 2, 0));
    let b = RunId::for_version(&SemanticVersion::new(1, 2, 0));
    let c = RunId::for_version(&SemanticVersion::new(1, 2, 1));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str().len(), 12);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_happy_path_runs_stages_in_order() {
    let executor = ScriptedExecutor::producing(&["dist/app.tar.gz"]);
    let mut run = PublishRun::queue(&record("1.2.0"));
    PublishPipeline::new(&executor).start(&mut run).unwrap();

    assert_eq!(run.stage, PublishStage::Done);
    assert_eq!(executor.calls(), vec!["build", "verify", "sign", "attest", "publish"]);
    assert!(run.artifacts.contains("dist/app.tar.gz"));
    let stages: Vec<_> = run.history.iter().map(|t| t.to).collect();
    assert_eq!(
      stages,
      vec![
        PublishStage::Building,
        PublishStage::Signing,
        PublishStage::Attesting,
        PublishStage::Publishing,
        PublishStage::Done,
      ]
    );
  }

  #[test]
  fn test_failure_halts_and_records_stage() {
    let executor = ScriptedExecutor::producing(&["dist/app.tar.gz"]).failing("attest", 1);
    let mut run = PublishRun::queue(&record("1.2.0"));
    let err = PublishPipeline::new(&executor).start(&mut run).unwrap_err();

    assert!(matches!(err, ShipError::PublishStage(ref e) if e.stage == "attesting"));
    assert_eq!(run.stage, PublishStage::Failed);
    assert_eq!(run.failed_stage, Some(PublishStage::Attesting));
    assert!(!executor.calls().contains(&"publish"));
  }

  #[test]
  fn test_retry_resumes_from_failed_stage() {
    let executor = ScriptedExecutor::producing(&["dist/app.tar.gz"]).failing("attest", 1);
    let mut run = PublishRun::queue(&record("1.2.0"));
    let pipeline = PublishPipeline::new(&executor);
    assert!(pipeline.start(&mut run).is_err());

    pipeline.retry(&mut run).unwrap();
    assert_eq!(run.stage, PublishStage::Done);
    assert_eq!(run.attempts, 2);
    assert_eq!(run.failed_stage, None);
    // build and sign ran exactly once
    let calls = executor.calls();
    assert_eq!(calls.iter().filter(|c| **c == "build").count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == "sign").count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == "attest").count(), 2);
  }

  #[test]
  fn test_empty_build_never_reaches_signing() {
    let executor = ScriptedExecutor::producing(&[]);
    let mut run = PublishRun::queue(&record("1.2.0"));
    assert!(PublishPipeline::new(&executor).start(&mut run).is_err());
    assert_eq!(run.failed_stage, Some(PublishStage::Building));
    assert_eq!(executor.calls(), vec!["build"]);
  }

  #[test]
  fn test_missing_artifact_blocks_signing() {
    let mut executor = ScriptedExecutor::producing(&["dist/app.tar.gz", "dist/app.sbom"]);
    executor.missing = vec!["dist/app.sbom"];
    let mut run = PublishRun::queue(&record("1.2.0"));
    assert!(PublishPipeline::new(&executor).start(&mut run).is_err());
    assert_eq!(run.failed_stage, Some(PublishStage::Signing));
    assert!(!executor.calls().contains(&"sign"));
  }

  #[test]
  fn test_retry_requires_failed_run() {
    let executor = ScriptedExecutor::producing(&["dist/app.tar.gz"]);
    let mut run = PublishRun::queue(&record("1.2.0"));
    let pipeline = PublishPipeline::new(&executor);
    assert!(pipeline.retry(&mut run).is_err());
    pipeline.start(&mut run).unwrap();
    assert!(pipeline.retry(&mut run).is_err());
    assert!(pipeline.start(&mut run).is_err());
  }

  #[test]
  fn test_one_run_per_version() {
    let first = queue_run(&[], &record("1.2.0")).unwrap();
    assert!(queue_run(std::slice::from_ref(&first), &record("1.2.0")).is_err());
    assert!(queue_run(&[first], &record("1.3.0")).is_ok());
  }
}
