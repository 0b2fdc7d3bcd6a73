//! Shared context for command execution.
//!
//! Holds the config store and caches the merged configuration so every
//! command of one invocation sees the same view, plus factories for the
//! pieces commands need (API client, tokio runtime).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::api::ApiClient;
use crate::config::{ConfigStore, GantryConfig};

pub struct CommandContext {
    store: ConfigStore,
    config_cache: OnceLock<GantryConfig>,
}

impl CommandContext {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            config_cache: OnceLock::new(),
        }
    }

    /// Context rooted at the current directory with the standard global
    /// config location.
    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(ConfigStore::discover()?))
    }

    /// Context from explicit paths, for tests and embedding.
    pub fn from_paths(global_path: PathBuf, start_dir: &Path) -> Self {
        Self::new(ConfigStore::from_paths(global_path, start_dir))
    }

    /// Directory the archive builder walks.
    pub fn project_root(&self) -> &Path {
        self.store.project_root()
    }

    /// Merged configuration, loaded once on first access.
    pub fn config(&self) -> anyhow::Result<&GantryConfig> {
        if let Some(config) = self.config_cache.get() {
            return Ok(config);
        }
        let loaded = self.store.load()?;
        let _ = self.config_cache.set(loaded);
        // OnceLock guarantees get() returns Some after set()
        Ok(self.config_cache.get().expect("config was just set"))
    }

    /// API client honoring the configured `[http]` timeout.
    pub fn api_client(&self) -> anyhow::Result<ApiClient> {
        let timeout = self.config()?.timeout();
        ApiClient::new(timeout)
    }

    /// Runtime for bridging the async client from synchronous commands.
    pub fn runtime(&self) -> anyhow::Result<tokio::runtime::Runtime> {
        tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_is_cached_across_calls() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            project.join("gantry.toml"),
            "[project]\nname = \"crawler\"\n",
        )
        .unwrap();

        let context =
            CommandContext::from_paths(temp.path().join("global").join("gantry.toml"), &project);
        let first = context.config().unwrap();
        assert_eq!(first.project.as_ref().unwrap().name, "crawler");

        let second = context.config().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn project_root_is_the_config_directory() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("workspace").join("crawler");
        let nested = project.join("spiders");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(project.join("gantry.toml"), "").unwrap();

        let context =
            CommandContext::from_paths(temp.path().join("global").join("gantry.toml"), &nested);
        assert_eq!(context.project_root(), project);
    }
}
