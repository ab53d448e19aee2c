//! `shiprail proposal`: inspect and resolve the pending release proposal
//!
//! Merge, close and cancel are events guarded by the proposal id the operator
//! saw. A stale id is refused instead of acting on a newer proposal.

use crate::core::context::WorkspaceContext;
use crate::core::error::{ResultExt, ShipError, ShipResult};
use crate::publish::pipeline::{RunId, queue_run};
use crate::release::orchestrator::{EventOutcome, ProposalId, ReleaseEvent, ReleaseProposal, ReleaseRecord};
use crate::ui::output::{OutputFormat, print_output};
use serde::Serialize;
use std::fmt::{self, Write};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ProposalView<'a> {
  pending: Option<&'a ReleaseProposal>,
  last_released: Option<String>,
  unreleased: usize,
}

#[derive(Debug, Serialize)]
struct MergeReport {
  release: ReleaseRecord,
  publish_run: RunId,
  #[serde(skip_serializing_if = "Option::is_none")]
  changelog_path: Option<String>,
}

/// Show the pending proposal, if any
pub fn run_proposal_show(ctx: &WorkspaceContext, format: OutputFormat) -> ShipResult<()> {
  let state = ctx.store.load()?;
  let view = ProposalView {
    pending: state.release.pending(),
    last_released: state.release.last_released.map(|v| v.to_string()),
    unreleased: state.release.unreleased.len(),
  };
  print_output(format, &view, |out| render_proposal(out, &view))
}

fn render_proposal(out: &mut String, view: &ProposalView<'_>) -> fmt::Result {
  let Some(proposal) = view.pending else {
    writeln!(out, "⚪ No pending release proposal")?;
    return writeln!(out, "   {} unreleased change(s) recorded", view.unreleased);
  };

  writeln!(out, "📝 Release proposal {} (revision {})", proposal.id, proposal.revision)?;
  writeln!(out)?;
  writeln!(out, "  Base:     {}", proposal.base_version)?;
  writeln!(out, "  Proposed: {}", proposal.computed_next_version)?;
  writeln!(out, "  Changes:  {}", proposal.accumulated_changes.len())?;
  writeln!(out)?;
  for line in proposal.changelog_text.lines() {
    writeln!(out, "  {}", line)?;
  }
  writeln!(out)?;
  writeln!(out, "To release:")?;
  writeln!(out, "  shiprail proposal merge --id {}", proposal.id)
}

/// Promote the pending proposal and queue its publish run
pub fn run_proposal_merge(
  ctx: &WorkspaceContext,
  id: String,
  write_changelog: bool,
  format: OutputFormat,
) -> ShipResult<()> {
  let proposal_id = ProposalId::from(id.as_str());

  let (record, run_id) = ctx.store.update(|state| {
    let mut orchestrator = ctx.orchestrator(state.release.clone())?;
    let outcome = orchestrator.handle(ReleaseEvent::ProposalMerged { proposal_id })?;
    let EventOutcome::Released(record) = outcome else {
      return Err(ShipError::message("Merge did not produce a release record"));
    };

    let run = queue_run(&state.publish_runs, &record)?;
    let run_id = run.id.clone();
    state.release = orchestrator.into_state();
    state.publish_runs.push(run);
    Ok((record, run_id))
  })?;

  let changelog_path = if write_changelog {
    let path = ctx.changelog_path();
    let date = record.released_at.format("%Y-%m-%d").to_string();
    let section = ctx
      .config
      .changelog_builder()?
      .build_dated(&record.version, &date, &record.source_change_list);
    prepend_changelog(&path, &section)?;
    Some(path.display().to_string())
  } else {
    None
  };

  let report = MergeReport {
    release: record,
    publish_run: run_id,
    changelog_path,
  };
  print_output(format, &report, |out| render_merge(out, &report))
}

fn render_merge(out: &mut String, report: &MergeReport) -> fmt::Result {
  let record = &report.release;
  writeln!(out, "✅ Released {} ({})", record.version, record.tag)?;
  writeln!(out, "   {} change(s)", record.source_change_list.len())?;
  if let Some(path) = &report.changelog_path {
    writeln!(out, "   Updated {}", path)?;
  }
  writeln!(out)?;
  writeln!(out, "Next steps:")?;
  writeln!(out, "  git tag -a {} -m \"Release {}\"", record.tag, record.version)?;
  writeln!(out, "  shiprail publish run {}", record.version)?;
  writeln!(out, "   (publish run {})", report.publish_run)
}

/// Close the pending proposal as stale or conflicting; a fresh one is opened if warranted
pub fn run_proposal_close(ctx: &WorkspaceContext, id: String, reason: String, format: OutputFormat) -> ShipResult<()> {
  let proposal_id = ProposalId::from(id.as_str());
  let outcome = ctx.store.update(|state| {
    let mut orchestrator = ctx.orchestrator(state.release.clone())?;
    let outcome = orchestrator.handle(ReleaseEvent::ProposalInvalidated { proposal_id, reason })?;
    state.release = orchestrator.into_state();
    Ok(outcome)
  })?;

  print_output(format, &outcome, |out| {
    if let EventOutcome::ProposalClosed { closed, reopened } = &outcome {
      writeln!(out, "🗑️  Closed {}", closed)?;
      match reopened {
        Some(new_id) => writeln!(out, "📝 Reopened as {}", new_id)?,
        None => writeln!(out, "   No release warranted by the unreleased changes")?,
      }
    }
    Ok(())
  })
}

/// Discard the pending proposal; its changes stay unreleased
pub fn run_proposal_cancel(ctx: &WorkspaceContext, id: String, format: OutputFormat) -> ShipResult<()> {
  let proposal_id = ProposalId::from(id.as_str());
  let outcome = ctx.store.update(|state| {
    let mut orchestrator = ctx.orchestrator(state.release.clone())?;
    let outcome = orchestrator.handle(ReleaseEvent::Cancel { proposal_id })?;
    state.release = orchestrator.into_state();
    Ok(outcome)
  })?;

  print_output(format, &outcome, |out| {
    writeln!(out, "🗑️  Cancelled {}", id)?;
    writeln!(out, "   The next qualifying change opens a new proposal")
  })
}

/// Insert `section` after the `# Changelog` header, creating the file if needed
fn prepend_changelog(path: &Path, section: &str) -> ShipResult<()> {
  let existing = if path.exists() {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
  } else {
    "# Changelog\n\nAll notable changes to this project will be documented in this file.\n\n".to_string()
  };

  let content = insert_section(&existing, section);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
  Ok(())
}

/// Newest release goes below the header and intro, above the previous newest
fn insert_section(existing: &str, section: &str) -> String {
  if !existing.contains("# Changelog") {
    return format!("{}\n{}", section, existing);
  }
  match existing.find("\n## [") {
    Some(idx) => {
      let (head, rest) = existing.split_at(idx + 1);
      format!("{}{}\n{}", head, section, rest)
    }
    None => format!("{}\n\n{}", existing.trim_end(), section),
  }
}
