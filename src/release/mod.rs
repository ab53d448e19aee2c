//! Release engine: from commit subjects to promoted releases
//!
//! # Flow
//!
//! ```text
//! commit subject ──classify──> ChangeDescriptor
//!                                   │ ChangeLanded
//!                                   v
//!                        ReleaseOrchestrator ──(version, changelog)──> ReleaseProposal
//!                                   │ ProposalMerged
//!                                   v
//!                             ReleaseRecord ──> publish pipeline
//! ```
//!
//! - **classifier**: conventional header grammar and quality warnings
//! - **version**: semantic versions and the bump policy
//! - **changelog**: ordered, escaped changelog sections
//! - **orchestrator**: the single pending proposal and its guarded transitions
//! - **state**: locked, atomic persistence of orchestrator and publish state
//! - **tags**: release tag parsing for conflict detection

pub mod changelog;
pub mod classifier;
pub mod orchestrator;
pub mod state;
pub mod tags;
pub mod version;

pub use changelog::ChangelogBuilder;
pub use classifier::{ChangeDescriptor, ChangeType, Classifier};
pub use orchestrator::{
  EventOutcome, OrchestratorHandle, ProposalId, ReleaseEvent, ReleaseOrchestrator, ReleaseProposal, ReleaseRecord,
};
pub use state::{StateFile, StateStore};
pub use version::{BumpPolicy, SemanticVersion, next_version};
