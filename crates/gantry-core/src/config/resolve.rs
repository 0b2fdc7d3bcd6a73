//! Resolution rules: which target, which project, which pairs.

use super::schema::{GantryConfig, Target};
use crate::error::ConfigError;

/// Resolve the target to operate on.
///
/// An explicit name must exist in the merged configuration. With no name,
/// a sole configured target is used; several configured targets are an
/// error rather than a guess.
pub fn resolve_target(config: &GantryConfig, explicit: Option<&str>) -> Result<Target, ConfigError> {
    match explicit {
        Some(name) => {
            let entry = config
                .targets
                .get(name)
                .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))?;
            entry.resolve(name)
        }
        None => {
            let mut entries = config.targets.iter();
            match (entries.next(), entries.next()) {
                (None, _) => Err(ConfigError::NoTargets),
                (Some((name, entry)), None) => entry.resolve(name),
                (Some(_), Some(_)) => Err(ConfigError::AmbiguousTarget {
                    names: config.targets.keys().cloned().collect(),
                }),
            }
        }
    }
}

/// Resolve the project for `target`: flag, then the target's own project,
/// then the `[project]` section.
pub fn resolve_project(
    config: &GantryConfig,
    target: &Target,
    explicit: Option<&str>,
) -> Result<String, ConfigError> {
    explicit
        .map(str::to_string)
        .or_else(|| target.project.clone())
        .or_else(|| config.project.as_ref().map(|p| p.name.clone()))
        .ok_or(ConfigError::MissingProject)
}

/// Resolve the project without a target in play (building an archive
/// locally): flag, then the `[project]` section.
pub fn resolve_local_project(
    config: &GantryConfig,
    explicit: Option<&str>,
) -> Result<String, ConfigError> {
    explicit
        .map(str::to_string)
        .or_else(|| config.project.as_ref().map(|p| p.name.clone()))
        .ok_or(ConfigError::MissingProject)
}

/// Resolve one (target, project) pair from the invocation flags.
pub fn resolve_pair(
    config: &GantryConfig,
    target_flag: Option<&str>,
    project_flag: Option<&str>,
) -> Result<(Target, String), ConfigError> {
    let target = resolve_target(config, target_flag)?;
    let project = resolve_project(config, &target, project_flag)?;
    Ok((target, project))
}

/// Every configured target paired with its resolved project.
///
/// Fails fast: one unusable target or one target with no project makes the
/// whole fan-out an error before any request is sent.
pub fn all_pairs(
    config: &GantryConfig,
    project_flag: Option<&str>,
) -> Result<Vec<(Target, String)>, ConfigError> {
    if config.targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    let mut pairs = Vec::with_capacity(config.targets.len());
    for (name, entry) in &config.targets {
        let target = entry.resolve(name)?;
        let project = resolve_project(config, &target, project_flag)?;
        pairs.push((target, project));
    }
    Ok(pairs)
}

/// Targets for one invocation, for operations that take no project.
pub fn select_targets(
    config: &GantryConfig,
    target_flag: Option<&str>,
    all_targets: bool,
) -> Result<Vec<Target>, ConfigError> {
    if all_targets {
        if config.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        config
            .targets
            .iter()
            .map(|(name, entry)| entry.resolve(name))
            .collect()
    } else {
        resolve_target(config, target_flag).map(|target| vec![target])
    }
}

/// Pairs for one invocation: the full set under `all_targets`, one
/// resolved pair otherwise. The CLI marks `--target` and `--all-targets`
/// as conflicting, so `target_flag` is ignored when `all_targets` is set.
pub fn select_pairs(
    config: &GantryConfig,
    target_flag: Option<&str>,
    project_flag: Option<&str>,
    all_targets: bool,
) -> Result<Vec<(Target, String)>, ConfigError> {
    if all_targets {
        all_pairs(config, project_flag)
    } else {
        resolve_pair(config, target_flag, project_flag).map(|pair| vec![pair])
    }
}
