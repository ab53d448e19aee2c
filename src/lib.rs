//! shiprail: conventional-commit release automation
//!
//! - **release**: classify changes, compute versions and changelogs, own the release proposal
//! - **publish**: resumable build → sign → attest → publish runs
//! - **core**: config, errors, logging, git
//! - **commands**: the CLI surface used by the `shiprail` binary

pub mod commands;
pub mod core;
pub mod publish;
pub mod release;
pub mod ui;
