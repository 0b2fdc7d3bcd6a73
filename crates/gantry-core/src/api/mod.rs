//! Typed client for the runner service JSON API.

pub mod client;
pub mod response;

pub use client::{ApiClient, ScheduleRequest};
pub use response::{
    Cancelled, Deployed, Job, JobList, ProjectList, Removed, Scheduled, SpiderList, VersionList,
};
