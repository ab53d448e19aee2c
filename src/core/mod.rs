//! Core plumbing shared by every shiprail command
//!
//! - **config**: shiprail.toml parsing, defaults and validation reports
//! - **context**: workspace context built once in main and passed to commands
//! - **error**: error types with contextual help and exit codes
//! - **logging**: tracing subscriber setup
//! - **vcs**: read-only git queries (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod vcs;
