//! Error types for configuration, archive building, and remote calls.
//!
//! Each stage of a deploy has its own taxonomy so callers can react to the
//! failure class without parsing messages: `ConfigError` for resolution and
//! file problems, `BuildError` for archive construction, `ApiError` for
//! anything that happens once a request leaves the process.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading `gantry.toml` or resolving targets and projects.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No `[target.<name>]` sections exist in any configuration layer.
    #[error("no targets configured; add a [target.<name>] section to gantry.toml")]
    NoTargets,

    /// More than one target is configured and none was named explicitly.
    #[error("no target specified and several are configured ({}); pass --target", .names.join(", "))]
    AmbiguousTarget { names: Vec<String> },

    /// A target was named that no configuration layer defines.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// No project name from any source (flag, target entry, `[project]`).
    #[error(
        "no project specified; pass --project, set project on the target, or add a [project] section"
    )]
    MissingProject,

    /// A target entry exists but carries no `url` after merging layers.
    #[error("target '{target}' has no url")]
    MissingUrl { target: String },

    /// The target's `url` value is not a valid absolute URL.
    #[error("target '{target}' has an invalid url '{url}': {source}")]
    InvalidUrl {
        target: String,
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A configuration file exists but is not valid TOML for our schema.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while turning a project directory into a deployable archive.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Every file under the project root was excluded (or none existed).
    #[error("no files to archive under {} after applying exclude patterns", .0.display())]
    EmptyProject(PathBuf),

    /// An exclude pattern could not be compiled.
    #[error("invalid exclude pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Filesystem error while walking or reading project files.
    #[error("archive build failed: {0}")]
    Io(#[from] std::io::Error),

    /// The zip encoder rejected an entry or could not finish the archive.
    #[error("archive encoding failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Failures for a single call against one remote runner service.
///
/// `Remote` is the only variant produced by a well-formed response; its
/// message is whatever the service sent, surfaced verbatim. The rest
/// classify transport and protocol breakdowns on this side of the wire.
#[derive(Error, Debug)]
pub enum ApiError {
    /// TCP/TLS level failure before any response arrived.
    #[error("cannot connect to {url}: {detail}")]
    Connection { url: String, detail: String },

    /// The configured deadline elapsed while waiting on the service.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Non-success HTTP status with no usable JSON error envelope.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The body was not the JSON envelope this API speaks.
    #[error("malformed response from {url}: {detail}")]
    Protocol { url: String, detail: String },

    /// The service answered `status = "error"`; message passed through as-is.
    #[error("{message}")]
    Remote { message: String },
}

impl ApiError {
    /// True when the failure happened before a valid envelope was decoded.
    ///
    /// Transport failures are worth retrying or checking connectivity for;
    /// a `Remote` error will recur until the request itself changes.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ApiError::Remote { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn ambiguous_target_lists_candidates() {
        let err = ConfigError::AmbiguousTarget {
            names: vec!["prod".to_string(), "staging".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("prod, staging"));
        assert!(msg.contains("--target"));
    }

    #[test]
    fn unknown_target_names_the_target() {
        let err = ConfigError::UnknownTarget("nosuch".to_string());
        assert!(err.to_string().contains("'nosuch'"));
    }

    #[test]
    fn invalid_url_keeps_the_offending_value() {
        let source = url::Url::parse("not a url").unwrap_err();
        let err = ConfigError::InvalidUrl {
            target: "prod".to_string(),
            url: "not a url".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("prod"));
        assert!(msg.contains("not a url"));
    }

    #[test]
    fn empty_project_shows_the_root() {
        let err = BuildError::EmptyProject(Path::new("/tmp/crawler").to_path_buf());
        assert!(err.to_string().contains("/tmp/crawler"));
    }

    #[test]
    fn remote_error_is_the_message_verbatim() {
        let err = ApiError::Remote {
            message: "spider 'missing' not found".to_string(),
        };
        assert_eq!(err.to_string(), "spider 'missing' not found");
        assert!(!err.is_transport());
    }

    #[test]
    fn transport_classification() {
        let timeout = ApiError::Timeout {
            url: "http://localhost:6800/schedule.json".to_string(),
        };
        assert!(timeout.is_transport());

        let status = ApiError::HttpStatus {
            status: 502,
            url: "http://localhost:6800/schedule.json".to_string(),
        };
        assert!(status.is_transport());
        assert!(status.to_string().contains("502"));
    }
}
