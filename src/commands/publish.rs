//! `shiprail publish`: drive publish runs of promoted releases
//!
//! Runs are queued by `proposal merge`. The stage commands run while the state
//! lock is held; the run's progress is saved whether the pipeline succeeds or
//! fails, so `retry` can resume where it stopped.

use crate::core::context::WorkspaceContext;
use crate::core::error::{ShipError, ShipResult};
use crate::publish::executor::CommandExecutor;
use crate::publish::pipeline::{PublishPipeline, PublishRun, PublishStage, RunId};
use crate::release::state::StateFile;
use crate::release::version::SemanticVersion;
use crate::ui::output::{OutputFormat, print_output};
use std::fmt::{self, Write};

/// Show one run, or all of them
pub fn run_publish_status(ctx: &WorkspaceContext, run: Option<String>, format: OutputFormat) -> ShipResult<()> {
  let state = ctx.store.load()?;
  if let Some(id) = run {
    let run = find_run(&state, &RunId::from(id.as_str()))?;
    return report(run, format);
  }

  let runs = &state.publish_runs;
  print_output(format, runs, |out| {
    if runs.is_empty() {
      writeln!(out, "⚪ No publish runs yet")?;
      return writeln!(out, "   Runs are queued when a release proposal is merged");
    }
    runs.iter().try_for_each(|run| render_run(out, run))
  })
}

/// Start the queued run for `version`, or the most recent queued run
pub fn run_publish_start(ctx: &WorkspaceContext, version: Option<String>, format: OutputFormat) -> ShipResult<()> {
  let target = match version {
    Some(v) => Some(RunId::for_version(&SemanticVersion::parse(&v)?)),
    None => None,
  };

  let executor = CommandExecutor::new(&ctx.root, ctx.config.publish.clone());
  let pipeline = PublishPipeline::new(&executor);

  let (run, result) = ctx.store.update(|state| {
    let id = match target {
      Some(id) => id,
      None => latest_queued(state)?,
    };
    let run = state
      .run_mut(&id)
      .ok_or_else(|| unknown_run(&id))?;
    let result = pipeline.start(run);
    Ok((run.clone(), result))
  })?;

  report(&run, format)?;
  result
}

/// Resume a failed run from its failed stage
pub fn run_publish_retry(ctx: &WorkspaceContext, run_id: String, format: OutputFormat) -> ShipResult<()> {
  let id = RunId::from(run_id.as_str());
  let executor = CommandExecutor::new(&ctx.root, ctx.config.publish.clone());
  let pipeline = PublishPipeline::new(&executor);

  let (run, result) = ctx.store.update(|state| {
    let run = state.run_mut(&id).ok_or_else(|| unknown_run(&id))?;
    let result = pipeline.retry(run);
    Ok((run.clone(), result))
  })?;

  report(&run, format)?;
  result
}

fn find_run<'a>(state: &'a StateFile, id: &RunId) -> ShipResult<&'a PublishRun> {
  state.run(id).ok_or_else(|| unknown_run(id))
}

fn latest_queued(state: &StateFile) -> ShipResult<RunId> {
  state
    .publish_runs
    .iter()
    .filter(|r| r.stage == PublishStage::Queued)
    .max_by_key(|r| r.created_at)
    .map(|r| r.id.clone())
    .ok_or_else(|| {
      ShipError::with_help(
        "No queued publish run",
        "Merge a release proposal first, or retry a failed run with `shiprail publish retry <RUN>`",
      )
    })
}

fn unknown_run(id: &RunId) -> ShipError {
  ShipError::with_help(
    format!("Unknown publish run '{}'", id),
    "List runs with `shiprail publish status`",
  )
}

fn report(run: &PublishRun, format: OutputFormat) -> ShipResult<()> {
  print_output(format, run, |out| render_run(out, run))
}

fn render_run(out: &mut String, run: &PublishRun) -> fmt::Result {
  let icon = match run.stage {
    PublishStage::Done => "✅",
    PublishStage::Failed => "❌",
    PublishStage::Queued => "⏳",
    _ => "🔄",
  };
  writeln!(out, "{} {} {} ({})", icon, run.id, run.version, run.stage)?;
  writeln!(out, "   tag:      {}", run.tag)?;
  writeln!(out, "   attempts: {}", run.attempts)?;
  if let Some(stage) = run.failed_stage {
    writeln!(out, "   failed:   {}", stage)?;
  }
  if let Some(err) = &run.last_error
    && run.stage == PublishStage::Failed
  {
    writeln!(out, "   error:    {}", err)?;
  }
  if !run.artifacts.is_empty() {
    writeln!(out, "   artifacts:")?;
    for artifact in &run.artifacts {
      writeln!(out, "     - {}", artifact)?;
    }
  }
  writeln!(out)
}
