//! High-level commands for gantry operations.
//!
//! This module is the public API the CLI (or any embedder) calls. Every
//! command is a synchronous facade: it resolves configuration, bridges
//! into the async client on a private runtime, and returns plain report
//! types the frontend renders.

pub mod context;
pub mod deploy;
pub mod remote;

pub use context::CommandContext;
pub use deploy::{DeployCommand, DeployOptions, DeployReport};
pub use remote::{
    CancelOptions, DeleteProjectOptions, DeleteVersionOptions, ListingOptions, RemoteCommand,
    ScheduleOptions,
};

use crate::config::GantryConfig;

/// One row of the targets listing.
#[derive(Debug, Clone)]
pub struct TargetOverview {
    pub name: String,
    /// Raw configured url; may be absent for an incomplete entry.
    pub url: Option<String>,
    /// Default project deployed to this target.
    pub project: Option<String>,
}

/// Configured targets as display rows, sorted by name. Pure config
/// lookup; never touches the network and never validates urls.
pub fn targets_overview(config: &GantryConfig) -> Vec<TargetOverview> {
    config
        .targets
        .iter()
        .map(|(name, entry)| TargetOverview {
            name: name.clone(),
            url: entry.url.clone(),
            project: entry.project.clone(),
        })
        .collect()
}
