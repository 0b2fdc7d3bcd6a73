//! Configuration: schema, parsing, layered loading, and resolution
//!
//! Two layers of one schema are in play: a global `gantry.toml` in the
//! user's config directory and the nearest project file found by walking
//! up from the working directory. Resolution turns the merged document
//! plus the invocation flags into concrete (target, project) pairs.

pub mod parser;
pub mod resolve;
pub mod schema;
pub mod store;

pub use parser::{expand_env, parse_config, parse_config_str};
pub use resolve::{
    all_pairs, resolve_local_project, resolve_pair, resolve_project, resolve_target, select_pairs,
    select_targets,
};
pub use schema::{
    BuildSection, DEFAULT_TIMEOUT_SECS, GantryConfig, HttpSection, ProjectSection, Target,
    TargetEntry,
};
pub use store::{CONFIG_FILE, ConfigStore, find_project_config, merge};
