//! Configuration schema for gantry.toml
//!
//! A document has up to four sections: `[project]` names the local crawling
//! project, `[target.<name>]` sections describe remote runner services,
//! `[build]` tunes archive construction, and `[http]` tunes the client.
//! Two layers of the same schema are merged at load time (global config
//! directory first, then the nearest project file), so every field on a
//! target entry is optional until resolution.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Request timeout applied when `[http] timeout_secs` is absent.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Root of a gantry.toml document (one layer, before merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GantryConfig {
    /// Local project identity.
    #[serde(default)]
    pub project: Option<ProjectSection>,

    /// Named deployment targets.
    #[serde(default, rename = "target")]
    pub targets: BTreeMap<String, TargetEntry>,

    /// Archive build settings.
    #[serde(default)]
    pub build: BuildSection,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Project name used when neither the flag nor the target supplies one.
    pub name: String,
}

/// One `[target.<name>]` section.
///
/// Every field is optional so a global layer can hold credentials while the
/// project layer holds the url (or vice versa); `resolve` enforces that the
/// merged entry ends up usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Default project deployed to this target.
    #[serde(default)]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSection {
    /// Exclude patterns applied on top of the built-in set.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Name of the single top-level directory inside the archive.
    /// Defaults to the resolved project name.
    #[serde(default)]
    pub package: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSection {
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A resolved deployment target: validated endpoint plus credentials.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Default project for this target, if configured.
    pub project: Option<String>,
}

impl TargetEntry {
    /// Validate this (already merged) entry into a usable target.
    pub fn resolve(&self, name: &str) -> Result<Target, ConfigError> {
        let raw = self.url.as_deref().ok_or_else(|| ConfigError::MissingUrl {
            target: name.to_string(),
        })?;
        let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
            target: name.to_string(),
            url: raw.to_string(),
            source,
        })?;
        Ok(Target {
            name: name.to_string(),
            url,
            username: self.username.clone(),
            password: self.password.clone(),
            project: self.project.clone(),
        })
    }

    /// Field-wise overlay; values set in `overlay` win.
    pub fn merged_with(&self, overlay: &TargetEntry) -> TargetEntry {
        TargetEntry {
            url: overlay.url.clone().or_else(|| self.url.clone()),
            username: overlay.username.clone().or_else(|| self.username.clone()),
            password: overlay.password.clone().or_else(|| self.password.clone()),
            project: overlay.project.clone().or_else(|| self.project.clone()),
        }
    }
}

impl GantryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective HTTP timeout for API calls.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Configured target names, sorted.
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_requires_url() {
        let entry = TargetEntry {
            username: Some("ops".to_string()),
            ..TargetEntry::default()
        };
        let err = entry.resolve("prod").unwrap_err();
        assert!(matches!(err, ConfigError::MissingUrl { target } if target == "prod"));
    }

    #[test]
    fn resolve_rejects_malformed_url() {
        let entry = TargetEntry {
            url: Some("not a url".to_string()),
            ..TargetEntry::default()
        };
        let err = entry.resolve("prod").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn resolve_carries_credentials_and_project() {
        let entry = TargetEntry {
            url: Some("http://localhost:6800".to_string()),
            username: Some("ops".to_string()),
            password: Some("hunter2".to_string()),
            project: Some("crawler".to_string()),
        };
        let target = entry.resolve("prod").unwrap();
        assert_eq!(target.name, "prod");
        assert_eq!(target.url.as_str(), "http://localhost:6800/");
        assert_eq!(target.username.as_deref(), Some("ops"));
        assert_eq!(target.password.as_deref(), Some("hunter2"));
        assert_eq!(target.project.as_deref(), Some("crawler"));
    }

    #[test]
    fn merged_with_prefers_overlay_values() {
        let base = TargetEntry {
            url: Some("http://global:6800".to_string()),
            username: Some("global-user".to_string()),
            password: Some("global-pass".to_string()),
            project: None,
        };
        let overlay = TargetEntry {
            url: Some("http://project:6800".to_string()),
            username: None,
            password: None,
            project: Some("crawler".to_string()),
        };

        let merged = base.merged_with(&overlay);
        assert_eq!(merged.url.as_deref(), Some("http://project:6800"));
        assert_eq!(merged.username.as_deref(), Some("global-user"));
        assert_eq!(merged.password.as_deref(), Some("global-pass"));
        assert_eq!(merged.project.as_deref(), Some("crawler"));
    }

    #[test]
    fn timeout_defaults_to_five_minutes() {
        let config = GantryConfig::new();
        assert_eq!(config.timeout(), Duration::from_secs(300));

        let config = GantryConfig {
            http: HttpSection {
                timeout_secs: Some(10),
            },
            ..GantryConfig::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn target_names_are_sorted() {
        let mut config = GantryConfig::new();
        config
            .targets
            .insert("staging".to_string(), TargetEntry::default());
        config
            .targets
            .insert("prod".to_string(), TargetEntry::default());
        assert_eq!(config.target_names(), vec!["prod", "staging"]);
    }
}
