//! Gantry Core Library
//!
//! Packages a crawling project into a versioned archive and drives the
//! JSON API of remote runner services: deploy, schedule, inspect,
//! cancel, and delete, against one target or all of them at once.

pub mod api;
pub mod archive;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, GantryConfig, Target, TargetEntry};

    // Archive
    pub use crate::archive::{Archive, ArchiveBuilder};

    // API
    pub use crate::api::{
        ApiClient, Cancelled, Deployed, Job, JobList, ProjectList, Removed, Scheduled,
        ScheduleRequest, SpiderList, VersionList,
    };

    // Dispatch
    pub use crate::dispatch::{Batch, DeployPair, Dispatcher, Outcome, PairKey};

    // Commands
    pub use crate::commands::{
        CancelOptions, CommandContext, DeleteProjectOptions, DeleteVersionOptions, DeployCommand,
        DeployOptions, DeployReport, ListingOptions, RemoteCommand, ScheduleOptions,
        TargetOverview, targets_overview,
    };

    // Errors
    pub use crate::error::{ApiError, BuildError, ConfigError};
}
