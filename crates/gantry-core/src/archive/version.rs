//! Version derivation for deployable archives.
//!
//! Precedence: an explicit version wins; otherwise a repository at or
//! above the project root supplies one (`git describe`, or a revision
//! count plus branch when no tag exists); otherwise a UTC timestamp.
//! Whatever the source, the result is sanitized so every remote service
//! accepts it as a path-safe identifier.

use std::path::Path;

use git2::{DescribeOptions, Repository};

/// Derive the version string to deploy from `project_root`.
pub fn derive(project_root: &Path, explicit: Option<&str>) -> String {
    if let Some(version) = explicit {
        return sanitize(version);
    }
    match repository_version(project_root) {
        Some(version) => version,
        None => timestamp(),
    }
}

/// Seconds-resolution UTC timestamp, the fallback when no other source
/// applies.
pub fn timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Keep `[A-Za-z0-9._-]`; everything else becomes `-`. An input with no
/// usable characters at all falls back to the timestamp.
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '-') {
        timestamp()
    } else {
        cleaned
    }
}

/// Version from the enclosing repository, if there is one with at least
/// one commit. Any failure along the way means "no repository version".
fn repository_version(project_root: &Path) -> Option<String> {
    let repo = Repository::discover(project_root).ok()?;
    if let Some(described) = describe(&repo) {
        return Some(sanitize(&described));
    }
    let count = revision_count(&repo)?;
    let branch = head_shorthand(&repo).unwrap_or_else(|| "detached".to_string());
    Some(sanitize(&format!("r{count}-{branch}")))
}

fn describe(repo: &Repository) -> Option<String> {
    let mut options = DescribeOptions::new();
    options.describe_tags();
    let described = repo.describe(&options).ok()?;
    described.format(None).ok()
}

fn revision_count(repo: &Repository) -> Option<usize> {
    let mut revwalk = repo.revwalk().ok()?;
    revwalk.push_head().ok()?;
    Some(revwalk.filter(|oid| oid.is_ok()).count())
}

fn head_shorthand(repo: &Repository) -> Option<String> {
    repo.head().ok()?.shorthand().map(str::to_string)
}
