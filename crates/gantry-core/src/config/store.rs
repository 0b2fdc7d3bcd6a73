//! Config store: discovery and layered loading of gantry.toml.
//!
//! Two layers share one schema: a global file in the user's config
//! directory and the nearest `gantry.toml` at or above the starting
//! directory. `load` parses whichever layers exist and merges them with
//! project values winning.

use std::path::{Path, PathBuf};

use super::schema::{BuildSection, GantryConfig, HttpSection};
use super::parser;
use crate::error::ConfigError;

/// File name looked up in the project tree and in the global config dir.
pub const CONFIG_FILE: &str = "gantry.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    global_path: PathBuf,
    project_path: Option<PathBuf>,
    project_root: PathBuf,
}

impl ConfigStore {
    /// Locate both layers starting from the current directory.
    pub fn discover() -> anyhow::Result<Self> {
        let global_path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("gantry")
            .join(CONFIG_FILE);
        let cwd = std::env::current_dir()?;
        Ok(Self::from_paths(global_path, &cwd))
    }

    /// Build a store from explicit paths; `start_dir` and its ancestors are
    /// searched for the project layer.
    pub fn from_paths(global_path: PathBuf, start_dir: &Path) -> Self {
        let project_path = find_project_config(start_dir);
        let project_root = project_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start_dir.to_path_buf());
        Self {
            global_path,
            project_path,
            project_root,
        }
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    /// Directory the archive builder walks: the one holding the project
    /// config file, or the starting directory when no file was found.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Load and merge both layers.
    pub fn load(&self) -> Result<GantryConfig, ConfigError> {
        let global = load_layer(&self.global_path)?;
        let project = match &self.project_path {
            Some(path) => parser::parse_config(path)?,
            None => GantryConfig::new(),
        };
        Ok(merge(global, project))
    }
}

fn load_layer(path: &Path) -> Result<GantryConfig, ConfigError> {
    if !path.exists() {
        return Ok(GantryConfig::new());
    }
    parser::parse_config(path)
}

/// Walk `start` and its ancestors looking for the project config file.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Merge two layers into the effective configuration.
///
/// Scalar sections take the project value when set; target entries merge
/// field-wise so a global layer can hold credentials while the project
/// layer holds urls; exclude patterns accumulate across both layers.
pub fn merge(global: GantryConfig, project: GantryConfig) -> GantryConfig {
    let mut targets = global.targets;
    for (name, overlay) in project.targets {
        let merged = match targets.get(&name) {
            Some(base) => base.merged_with(&overlay),
            None => overlay,
        };
        targets.insert(name, merged);
    }

    let mut exclude = global.build.exclude;
    exclude.extend(project.build.exclude);

    GantryConfig {
        project: project.project.or(global.project),
        targets,
        build: BuildSection {
            exclude,
            package: project.build.package.or(global.build.package),
        },
        http: HttpSection {
            timeout_secs: project.http.timeout_secs.or(global.http.timeout_secs),
        },
    }
}
