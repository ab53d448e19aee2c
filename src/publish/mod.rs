//! Publish pipeline for promoted releases
//!
//! - **pipeline**: resumable stage state machine keyed by run id
//! - **executor**: runs the configured build/sign/attest/publish commands

pub mod executor;
pub mod pipeline;

pub use executor::CommandExecutor;
pub use pipeline::{PublishPipeline, PublishRun, PublishStage, RunId, StageExecutor, queue_run};
