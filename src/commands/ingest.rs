//! `shiprail ingest`: feed landed changes to the release orchestrator
//!
//! Changes come from the command line (`--change`, optionally paired with
//! `--ref`) or from git (`--from-git`: commits since the latest release tag).
//! Until a release is recorded, the latest release tag is the base version
//! for both sources.
//! Each accepted change is one `ChangeLanded` event. Rejected subjects are
//! reported and skipped; they never abort the batch.

use crate::commands::classify::rejection;
use crate::core::context::WorkspaceContext;
use crate::core::error::{ShipError, ShipResult};
use crate::release::classifier::{BatchItem, BatchOutcome, ChangeDescriptor, ClassificationError};
use crate::release::orchestrator::{EventOutcome, ReleaseEvent, ReleaseState};
use crate::release::tags::{self, ReleaseTag};
use crate::ui::output::{OutputFormat, print_output};
use crate::ui::progress::IngestProgress;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::{self, Write};

/// Where the changes come from
pub enum IngestSource {
  Manual { changes: Vec<String>, refs: Vec<String> },
  Git,
}

#[derive(Debug, Serialize)]
struct IngestReport {
  outcomes: Vec<EventOutcome>,
  rejected: Vec<ClassificationError>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

/// Stable ref for a change typed on the command line, so re-ingesting it is a no-op
fn manual_ref(text: &str) -> String {
  let digest = Sha256::digest(text.as_bytes());
  let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
  format!("manual-{}", &hex[..12])
}

fn manual_inputs(changes: Vec<String>, refs: Vec<String>) -> ShipResult<Vec<(String, String)>> {
  if refs.len() > changes.len() {
    return Err(ShipError::with_help(
      format!("Got {} --ref values for {} --change values", refs.len(), changes.len()),
      "Pass at most one --ref per --change, in the same order",
    ));
  }
  let mut refs = refs.into_iter();
  Ok(
    changes
      .into_iter()
      .map(|text| {
        let source_ref = refs.next().unwrap_or_else(|| manual_ref(&text));
        (text, source_ref)
      })
      .collect(),
  )
}

/// Run the ingest command
pub fn run_ingest(ctx: &WorkspaceContext, source: IngestSource, format: OutputFormat) -> ShipResult<()> {
  let baseline = latest_release(ctx)?;
  let inputs = match source {
    IngestSource::Manual { changes, refs } => manual_inputs(changes, refs)?,
    IngestSource::Git => git_inputs(ctx, baseline.as_ref())?,
  };

  let items = ctx.config.classifier().classify_batch(&inputs);
  let (accepted, rejected) = split_items(&items);
  for err in &rejected {
    tracing::warn!(input = %err.input, reason = %err.reason, "skipping unclassifiable change");
  }

  let (outcomes, failure) = ctx.store.update(|state| {
    adopt_baseline(&mut state.release, baseline.as_ref());

    let mut orchestrator = ctx.orchestrator(state.release.clone())?;
    let mut progress = IngestProgress::new(accepted.len(), "Ingesting changes");
    let mut outcomes = Vec::new();
    let mut failure = None;
    for change in accepted {
      match orchestrator.handle(ReleaseEvent::ChangeLanded(change)) {
        Ok(outcome) => outcomes.push(outcome),
        Err(e) => {
          // applied events are kept; the failed one left the state untouched
          failure = Some(e);
          break;
        }
      }
      progress.inc();
    }
    state.release = orchestrator.into_state();
    Ok((outcomes, failure))
  })?;

  let report = IngestReport {
    outcomes,
    rejected,
    error: failure.as_ref().map(|e| e.to_string()),
  };
  print_output(format, &report, |out| render_report(out, &report))?;

  match failure {
    Some(e) => Err(e),
    None => Ok(()),
  }
}

/// Latest release tag in the repository, if any
fn latest_release(ctx: &WorkspaceContext) -> ShipResult<Option<ReleaseTag>> {
  let existing = ctx.existing_tags()?;
  Ok(tags::latest_release_tag(&existing, &ctx.config.release.tag_prefix))
}

/// With no release recorded yet, an existing release tag is the version to build on
fn adopt_baseline(release: &mut ReleaseState, baseline: Option<&ReleaseTag>) {
  if release.last_released.is_none()
    && let Some(tag) = baseline
  {
    tracing::info!(tag = %tag.tag_name, version = %tag.version, "adopting latest release tag as baseline");
    release.last_released = Some(tag.version);
  }
}

/// Commits since `since` (or all of them), oldest first
fn git_inputs(ctx: &WorkspaceContext, since: Option<&ReleaseTag>) -> ShipResult<Vec<(String, String)>> {
  let git = ctx.git()?;
  let since = since.map(|t| t.tag_name.as_str());
  let commits = git.commits_since(since)?;
  tracing::info!(
    since = since.unwrap_or("<root>"),
    commits = commits.len(),
    "collected commits from git"
  );

  Ok(commits.into_iter().map(|c| (c.message, c.sha)).collect())
}

fn split_items(items: &[BatchItem]) -> (Vec<ChangeDescriptor>, Vec<ClassificationError>) {
  let mut accepted = Vec::new();
  let mut rejected = Vec::new();
  for item in items {
    match &item.outcome {
      BatchOutcome::Classified(classification) => accepted.push(classification.descriptor.clone()),
      BatchOutcome::Rejected { .. } => rejected.extend(rejection(item)),
    }
  }
  (accepted, rejected)
}

fn render_report(out: &mut String, report: &IngestReport) -> fmt::Result {
  let mut recorded = 0;
  let mut duplicates = 0;
  for outcome in &report.outcomes {
    match outcome {
      EventOutcome::Recorded => recorded += 1,
      EventOutcome::Duplicate { .. } => duplicates += 1,
      EventOutcome::ProposalOpened { proposal_id, version } => {
        recorded += 1;
        writeln!(out, "📝 Opened release proposal {} for {}", proposal_id, version)?;
      }
      EventOutcome::ProposalUpdated {
        proposal_id,
        revision,
        version,
      } => {
        recorded += 1;
        writeln!(out, "🔄 Updated {} (revision {}) → {}", proposal_id, revision, version)?;
      }
      _ => {}
    }
  }

  writeln!(out, "✅ {} change(s) recorded", recorded)?;
  if duplicates > 0 {
    writeln!(out, "   {} already known, skipped", duplicates)?;
  }
  if !report.rejected.is_empty() {
    writeln!(out, "⚠️  {} change(s) not conventional, skipped:", report.rejected.len())?;
    for err in &report.rejected {
      writeln!(out, "   {} ({})", err.input, err.reason)?;
    }
  }
  Ok(())
}
