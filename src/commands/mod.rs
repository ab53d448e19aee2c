//! CLI commands for shiprail
//!
//! ## Inspection
//! - **classify**: check commit subjects against the conventional grammar
//! - **preview**: next version and changelog for changes given on the command line
//!
//! ## Release flow
//! - **ingest**: record landed changes (from arguments or git history)
//! - **proposal**: show, merge, close or cancel the pending release proposal
//! - **publish**: drive build → sign → attest → publish runs
//!
//! ## Setup
//! - **config**: validate, show and scaffold shiprail.toml
//! - **meta**: build metadata and resolved environment
//!
//! Commands that touch release state accept `&WorkspaceContext`.

pub mod classify;
pub mod config;
pub mod ingest;
pub mod meta;
pub mod preview;
pub mod proposal;
pub mod publish;

pub use classify::run_classify;
pub use config::{run_config_init, run_config_show, run_config_validate};
pub use ingest::{IngestSource, run_ingest};
pub use meta::{run_meta_env, run_meta_info};
pub use preview::{run_changelog, run_next_version};
pub use proposal::{run_proposal_cancel, run_proposal_close, run_proposal_merge, run_proposal_show};
pub use publish::{run_publish_retry, run_publish_start, run_publish_status};
