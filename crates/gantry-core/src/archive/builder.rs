//! Deterministic zip packaging of a project directory.
//!
//! The walk is filtered by gitignore-style patterns (built-ins plus any
//! configured extras), symlinks are not followed, entries are sorted by
//! path, and the layout is `manifest.json` plus a single `<package>/`
//! directory. The same tree and version always produce identical bytes.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::WalkDir;

use crate::error::BuildError;

/// Entry name of the archive manifest.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Patterns excluded from every archive.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git/",
    ".hg/",
    ".svn/",
    "__pycache__/",
    "*.pyc",
    "*.pyo",
    "build/",
    "*.egg-info/",
];

/// A built archive: zip bytes plus the identity baked into its manifest.
#[derive(Debug, Clone)]
pub struct Archive {
    package: String,
    version: String,
    bytes: Vec<u8>,
}

impl Archive {
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the archive to `path`, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Wrap an archive file built earlier.
    pub fn from_file(path: &Path, package: &str, version: &str) -> Result<Self, BuildError> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            package: package.to_string(),
            version: version.to_string(),
            bytes,
        })
    }
}

/// Builds the archive for one project directory.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    project_root: PathBuf,
    package: String,
    excludes: Vec<String>,
    skip_paths: Vec<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new(project_root: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            package: package.into(),
            excludes: Vec::new(),
            skip_paths: Vec::new(),
        }
    }

    /// Add one exclude pattern on top of [`DEFAULT_EXCLUDES`].
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Add several exclude patterns.
    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Never archive this path, pattern matching aside. Used for the
    /// output file when an archive is written into the tree it packages.
    pub fn skip_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let absolute = if path.is_absolute() {
            path
        } else {
            self.project_root.join(path)
        };
        self.skip_paths.push(absolute);
        self
    }

    /// Build the archive for `version`.
    pub fn build(&self, version: &str) -> Result<Archive, BuildError> {
        let matcher = self.matcher()?;
        let files = self.collect_files(&matcher)?;
        if files.is_empty() {
            return Err(BuildError::EmptyProject(self.project_root.clone()));
        }
        tracing::debug!(
            root = %self.project_root.display(),
            files = files.len(),
            "packaging project"
        );
        let bytes = self.write_zip(&files, version)?;
        Ok(Archive {
            package: self.package.clone(),
            version: version.to_string(),
            bytes,
        })
    }

    fn matcher(&self) -> Result<Gitignore, BuildError> {
        let mut builder = GitignoreBuilder::new(&self.project_root);
        for pattern in DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(self.excludes.iter().map(String::as_str))
        {
            builder
                .add_line(None, pattern)
                .map_err(|e| BuildError::Pattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
        }
        builder.build().map_err(|e| BuildError::Pattern {
            pattern: "<exclude set>".to_string(),
            message: e.to_string(),
        })
    }

    fn collect_files(&self, matcher: &Gitignore) -> Result<Vec<PathBuf>, BuildError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.project_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| self.keep_entry(entry, matcher));
        for entry in walker {
            let entry = entry.map_err(walk_error)?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&self.project_root)
                    .map_err(|_| outside_root(entry.path()))?;
                files.push(rel.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pruning filter: a rejected directory is never descended into.
    fn keep_entry(&self, entry: &walkdir::DirEntry, matcher: &Gitignore) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if self.skip_paths.iter().any(|skip| skip == entry.path()) {
            return false;
        }
        let rel = match entry.path().strip_prefix(&self.project_root) {
            Ok(rel) => rel,
            Err(_) => return false,
        };
        let is_dir = entry.file_type().is_dir();
        !matcher.matched_path_or_any_parents(rel, is_dir).is_ignore()
    }

    fn write_zip(&self, files: &[PathBuf], version: &str) -> Result<Vec<u8>, BuildError> {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        // Fixed timestamp keeps rebuilds of an unchanged tree byte-identical.
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let manifest = serde_json::json!({
            "project": self.package,
            "version": version,
        });
        writer.start_file(MANIFEST_ENTRY, options)?;
        writer.write_all(manifest.to_string().as_bytes())?;

        for rel in files {
            writer.start_file(format!("{}/{}", self.package, entry_name(rel)), options)?;
            let contents = std::fs::read(self.project_root.join(rel))?;
            writer.write_all(&contents)?;
        }
        writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Forward-slash entry name, whatever the host separator is.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(err: walkdir::Error) -> BuildError {
    let message = err.to_string();
    BuildError::Io(
        err.into_io_error()
            .unwrap_or_else(|| std::io::Error::other(message)),
    )
}

fn outside_root(path: &Path) -> BuildError {
    BuildError::Io(std::io::Error::other(format!(
        "walked path {} is outside the project root",
        path.display()
    )))
}
