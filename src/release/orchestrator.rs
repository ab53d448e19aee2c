//! Release proposal state machine
//!
//! The orchestrator owns the single pending release proposal. It is driven
//! by [`ReleaseEvent`]s and never waits on anything: a human merge is just
//! another event, delivered whenever it happens.
//!
//! Every event is applied to a copy of the state, validated, and only then
//! committed, so a rejected event leaves the state untouched.
//!
//! ```text
//! absent --qualifying change--> pending --merge--> promoted (slot cleared)
//!                                  |  ^
//!                   invalidated ---+  +--- re-evaluated with a new id
//! ```

use crate::core::error::{ProposalStateError, ShipError, ShipResult, VersionConflictError};
use crate::release::changelog::ChangelogBuilder;
use crate::release::classifier::{ChangeDescriptor, ChangeType};
use crate::release::tags::{self, ReleaseTag};
use crate::release::version::{BumpPolicy, SemanticVersion, next_version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Identifier of one proposal lifetime. A re-opened proposal gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
  fn from_sequence(seq: u64) -> Self {
    Self(format!("rp-{:04}", seq))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for ProposalId {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

impl fmt::Display for ProposalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
  Pending,
  Promoted,
  Closed,
}

impl fmt::Display for ProposalStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ProposalStatus::Pending => "pending",
      ProposalStatus::Promoted => "promoted",
      ProposalStatus::Closed => "closed",
    };
    f.write_str(s)
  }
}

/// Aggregation of unreleased changes with their computed version and changelog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseProposal {
  pub id: ProposalId,
  /// Bumped each time the accumulated set changes
  pub revision: u64,
  pub base_version: SemanticVersion,
  pub accumulated_changes: Vec<ChangeDescriptor>,
  pub computed_next_version: SemanticVersion,
  pub changelog_text: String,
  pub status: ProposalStatus,
  pub opened_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub close_reason: Option<String>,
}

/// Frozen output of a promotion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
  pub version: SemanticVersion,
  pub tag: String,
  pub changelog_text: String,
  pub source_change_list: Vec<ChangeDescriptor>,
  pub proposal_id: ProposalId,
  pub released_at: DateTime<Utc>,
}

/// Everything the orchestrator owns; persisted by the state store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
  #[serde(default)]
  pub last_released: Option<SemanticVersion>,
  #[serde(default)]
  pub releases: Vec<ReleaseRecord>,
  #[serde(default)]
  pub unreleased: Vec<ChangeDescriptor>,
  /// Proposal history; at most one entry is pending
  #[serde(default)]
  pub proposals: Vec<ReleaseProposal>,
  #[serde(default)]
  pub proposal_seq: u64,
}

impl ReleaseState {
  /// Reject states holding more than one pending proposal
  pub fn validate(&self) -> Result<(), ProposalStateError> {
    let count = self
      .proposals
      .iter()
      .filter(|p| p.status == ProposalStatus::Pending)
      .count();
    if count > 1 {
      return Err(ProposalStateError::MultiplePending { count });
    }
    Ok(())
  }

  pub fn pending(&self) -> Option<&ReleaseProposal> {
    self.proposals.iter().find(|p| p.status == ProposalStatus::Pending)
  }

  fn pending_mut(&mut self) -> Option<&mut ReleaseProposal> {
    self.proposals.iter_mut().find(|p| p.status == ProposalStatus::Pending)
  }

  fn is_known(&self, source_ref: &str) -> bool {
    !source_ref.is_empty()
      && (self.unreleased.iter().any(|c| c.source_ref() == source_ref)
        || self
          .releases
          .iter()
          .any(|r| r.source_change_list.iter().any(|c| c.source_ref() == source_ref)))
  }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseEvent {
  ChangeLanded(ChangeDescriptor),
  ProposalMerged { proposal_id: ProposalId },
  ProposalInvalidated { proposal_id: ProposalId, reason: String },
  Cancel { proposal_id: ProposalId },
}

/// What an event did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
  /// Change already seen; nothing changed
  Duplicate { source_ref: String },
  /// Change recorded as unreleased; proposal untouched
  Recorded,
  ProposalOpened {
    proposal_id: ProposalId,
    version: SemanticVersion,
  },
  ProposalUpdated {
    proposal_id: ProposalId,
    revision: u64,
    version: SemanticVersion,
  },
  Released(ReleaseRecord),
  ProposalClosed {
    closed: ProposalId,
    reopened: Option<ProposalId>,
  },
  Cancelled {
    proposal_id: ProposalId,
  },
}

/// Knobs the state machine is evaluated under
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
  pub policy: BumpPolicy,
  pub changelog: ChangelogBuilder,
  /// Non-qualifying types still listed in a proposal's changelog
  pub include_types: Vec<ChangeType>,
  pub initial_version: SemanticVersion,
  pub tag_prefix: String,
}

impl Default for OrchestratorSettings {
  fn default() -> Self {
    Self {
      policy: BumpPolicy::default(),
      changelog: ChangelogBuilder::default(),
      include_types: vec![ChangeType::Perf, ChangeType::Docs],
      initial_version: SemanticVersion::default(),
      tag_prefix: "v".to_string(),
    }
  }
}

/// Version and changelog computed from an unreleased change set
struct Evaluation {
  changes: Vec<ChangeDescriptor>,
  version: SemanticVersion,
  changelog_text: String,
}

/// Single-writer owner of the release proposal slot
#[derive(Debug)]
pub struct ReleaseOrchestrator {
  settings: OrchestratorSettings,
  state: ReleaseState,
  existing_tags: Vec<String>,
}

impl ReleaseOrchestrator {
  /// Wrap loaded state; fails if it violates the single-pending invariant
  pub fn new(settings: OrchestratorSettings, state: ReleaseState) -> ShipResult<Self> {
    state.validate()?;
    Ok(Self {
      settings,
      state,
      existing_tags: Vec::new(),
    })
  }

  /// Tags already present in the repository, used for conflict detection
  pub fn with_existing_tags(mut self, tags: Vec<String>) -> Self {
    self.existing_tags = tags;
    self
  }

  pub fn state(&self) -> &ReleaseState {
    &self.state
  }

  pub fn into_state(self) -> ReleaseState {
    self.state
  }

  pub fn pending(&self) -> Option<&ReleaseProposal> {
    self.state.pending()
  }

  pub fn base_version(&self) -> SemanticVersion {
    self.state.last_released.unwrap_or(self.settings.initial_version)
  }

  /// Apply one event atomically
  pub fn handle(&mut self, event: ReleaseEvent) -> ShipResult<EventOutcome> {
    let mut candidate = self.state.clone();
    let now = Utc::now();

    let outcome = match event {
      ReleaseEvent::ChangeLanded(change) => self.change_landed(&mut candidate, change, now)?,
      ReleaseEvent::ProposalMerged { proposal_id } => self.merge(&mut candidate, &proposal_id, now)?,
      ReleaseEvent::ProposalInvalidated { proposal_id, reason } => {
        self.invalidate(&mut candidate, &proposal_id, &reason, now)?
      }
      ReleaseEvent::Cancel { proposal_id } => self.cancel(&mut candidate, &proposal_id, now)?,
    };

    candidate.validate()?;
    self.state = candidate;
    Ok(outcome)
  }

  fn change_landed(
    &self,
    state: &mut ReleaseState,
    change: ChangeDescriptor,
    now: DateTime<Utc>,
  ) -> ShipResult<EventOutcome> {
    if state.is_known(change.source_ref()) {
      tracing::debug!(source_ref = change.source_ref(), "duplicate change ignored");
      return Ok(EventOutcome::Duplicate {
        source_ref: change.source_ref().to_string(),
      });
    }
    state.unreleased.push(change);

    let has_pending = state.pending().is_some();
    match self.evaluate(state)? {
      None if !has_pending => Ok(EventOutcome::Recorded),
      Some(evaluation) if !has_pending => self.open_proposal(state, evaluation, now),
      Some(evaluation) => self.update_pending(state, evaluation, now),
      // changes only accumulate, so this means the bump policy changed under a pending proposal
      None => Err(ShipError::with_help(
        "Pending proposal no longer warrants a release under the current bump policy",
        "Cancel it with `shiprail proposal cancel --id <ID>`",
      )),
    }
  }

  fn update_pending(
    &self,
    state: &mut ReleaseState,
    evaluation: Evaluation,
    now: DateTime<Utc>,
  ) -> ShipResult<EventOutcome> {
    let unchanged = state
      .pending()
      .is_some_and(|p| p.accumulated_changes == evaluation.changes);
    if unchanged {
      return Ok(EventOutcome::Recorded);
    }
    self.check_conflict(state, &evaluation.version)?;

    let Some(pending) = state.pending_mut() else {
      return Ok(EventOutcome::Recorded);
    };
    pending.revision += 1;
    pending.accumulated_changes = evaluation.changes;
    pending.computed_next_version = evaluation.version;
    pending.changelog_text = evaluation.changelog_text;
    pending.updated_at = now;
    tracing::info!(
      proposal = %pending.id,
      revision = pending.revision,
      version = %pending.computed_next_version,
      "release proposal updated"
    );
    Ok(EventOutcome::ProposalUpdated {
      proposal_id: pending.id.clone(),
      revision: pending.revision,
      version: pending.computed_next_version,
    })
  }

  fn merge(&self, state: &mut ReleaseState, id: &ProposalId, now: DateTime<Utc>) -> ShipResult<EventOutcome> {
    let proposal = Self::guarded_pending(state, id)?.clone();
    let tag = self.check_conflict(state, &proposal.computed_next_version)?;

    if let Some(pending) = state.pending_mut() {
      pending.status = ProposalStatus::Promoted;
      pending.updated_at = now;
    }

    let record = ReleaseRecord {
      version: proposal.computed_next_version,
      tag,
      changelog_text: proposal.changelog_text,
      source_change_list: proposal.accumulated_changes,
      proposal_id: proposal.id,
      released_at: now,
    };
    state.last_released = Some(record.version);
    state.releases.push(record.clone());
    state.unreleased.clear();

    tracing::info!(version = %record.version, tag = %record.tag, proposal = %record.proposal_id, "release promoted");
    Ok(EventOutcome::Released(record))
  }

  fn invalidate(
    &self,
    state: &mut ReleaseState,
    id: &ProposalId,
    reason: &str,
    now: DateTime<Utc>,
  ) -> ShipResult<EventOutcome> {
    Self::guarded_pending(state, id)?;
    Self::close_pending(state, reason, now);
    tracing::info!(proposal = %id, reason, "release proposal closed");

    let reopened = match self.evaluate(state)? {
      Some(evaluation) => match self.open_proposal(state, evaluation, now)? {
        EventOutcome::ProposalOpened { proposal_id, .. } => Some(proposal_id),
        _ => None,
      },
      None => None,
    };

    Ok(EventOutcome::ProposalClosed {
      closed: id.clone(),
      reopened,
    })
  }

  fn cancel(&self, state: &mut ReleaseState, id: &ProposalId, now: DateTime<Utc>) -> ShipResult<EventOutcome> {
    Self::guarded_pending(state, id)?;
    Self::close_pending(state, "cancelled", now);
    tracing::info!(proposal = %id, "release proposal cancelled");
    Ok(EventOutcome::Cancelled {
      proposal_id: id.clone(),
    })
  }

  /// Compare-and-swap guard: the event must name the pending proposal
  fn guarded_pending<'a>(state: &'a ReleaseState, id: &ProposalId) -> Result<&'a ReleaseProposal, ProposalStateError> {
    match state.pending() {
      None => Err(ProposalStateError::NoPendingProposal {
        requested: id.to_string(),
      }),
      Some(pending) if pending.id != *id => Err(ProposalStateError::ProposalMismatch {
        requested: id.to_string(),
        pending: pending.id.to_string(),
      }),
      Some(pending) => Ok(pending),
    }
  }

  fn close_pending(state: &mut ReleaseState, reason: &str, now: DateTime<Utc>) {
    if let Some(pending) = state.pending_mut() {
      pending.status = ProposalStatus::Closed;
      pending.close_reason = Some(reason.to_string());
      pending.updated_at = now;
    }
  }

  fn open_proposal(
    &self,
    state: &mut ReleaseState,
    evaluation: Evaluation,
    now: DateTime<Utc>,
  ) -> ShipResult<EventOutcome> {
    self.check_conflict(state, &evaluation.version)?;

    state.proposal_seq += 1;
    let id = ProposalId::from_sequence(state.proposal_seq);
    let proposal = ReleaseProposal {
      id: id.clone(),
      revision: 1,
      base_version: state.last_released.unwrap_or(self.settings.initial_version),
      accumulated_changes: evaluation.changes,
      computed_next_version: evaluation.version,
      changelog_text: evaluation.changelog_text,
      status: ProposalStatus::Pending,
      opened_at: now,
      updated_at: now,
      close_reason: None,
    };
    tracing::info!(proposal = %id, version = %proposal.computed_next_version, "release proposal opened");
    state.proposals.push(proposal);

    Ok(EventOutcome::ProposalOpened {
      proposal_id: id,
      version: evaluation.version,
    })
  }

  /// Recompute from scratch over the unreleased set. `None` when no release is warranted.
  fn evaluate(&self, state: &ReleaseState) -> ShipResult<Option<Evaluation>> {
    let base = state.last_released.unwrap_or(self.settings.initial_version);
    let policy = &self.settings.policy;

    let changes: Vec<ChangeDescriptor> = state
      .unreleased
      .iter()
      .filter(|c| policy.is_qualifying(c) || self.settings.include_types.contains(&c.change_type()))
      .cloned()
      .collect();

    let version = next_version(base, &changes, policy)?;
    if version == base {
      return Ok(None);
    }

    let changelog_text = self.settings.changelog.build(&version, &changes);
    Ok(Some(Evaluation {
      changes,
      version,
      changelog_text,
    }))
  }

  /// Refuse versions that already exist as a tag or a recorded release. Returns the tag to create.
  fn check_conflict(&self, state: &ReleaseState, version: &SemanticVersion) -> Result<String, VersionConflictError> {
    let tag = ReleaseTag::format(&self.settings.tag_prefix, version);
    if let Some(existing) = tags::find_conflicting_tag(&self.existing_tags, &self.settings.tag_prefix, version) {
      return Err(VersionConflictError {
        version: version.to_string(),
        tag: existing,
      });
    }
    if let Some(record) = state.releases.iter().find(|r| r.version == *version) {
      return Err(VersionConflictError {
        version: version.to_string(),
        tag: record.tag.clone(),
      });
    }
    Ok(tag)
  }
}

/// Shared handle serializing concurrent submitters. The lock is held for one event only.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
  inner: Arc<Mutex<ReleaseOrchestrator>>,
}

impl OrchestratorHandle {
  pub fn new(orchestrator: ReleaseOrchestrator) -> Self {
    Self {
      inner: Arc::new(Mutex::new(orchestrator)),
    }
  }

  pub fn submit(&self, event: ReleaseEvent) -> ShipResult<EventOutcome> {
    let mut orchestrator = self
      .inner
      .lock()
      .map_err(|_| ShipError::message("Release orchestrator lock poisoned"))?;
    orchestrator.handle(event)
  }

  pub fn snapshot(&self) -> ShipResult<ReleaseState> {
    let orchestrator = self
      .inner
      .lock()
      .map_err(|_| ShipError::message("Release orchestrator lock poisoned"))?;
    Ok(orchestrator.state().clone())
  }
}
