//! Deploy command: package the project and push it to targets.
//!
//! The archive for a project is built once per invocation and uploaded
//! to every selected target; the version is derived once so all targets
//! receive the same identifier. `--build-only` stops after writing the
//! archive, and a prebuilt file can be uploaded instead of packaging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::Deployed;
use crate::archive::{Archive, ArchiveBuilder, version};
use crate::config::{GantryConfig, resolve};
use crate::dispatch::{Batch, DeployPair, Dispatcher};
use crate::error::{ApiError, BuildError};

use super::context::CommandContext;

/// Options for one deploy invocation.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    target: Option<String>,
    project: Option<String>,
    version: Option<String>,
    archive: Option<PathBuf>,
    build_only: Option<PathBuf>,
    all_targets: bool,
    concurrency: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            target: None,
            project: None,
            version: None,
            archive: None,
            build_only: None,
            all_targets: false,
            concurrency: 1,
        }
    }
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Upload this file instead of packaging the project directory.
    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive = Some(path.into());
        self
    }

    /// Write the archive to this path and skip the upload entirely.
    pub fn with_build_only(mut self, output: impl Into<PathBuf>) -> Self {
        self.build_only = Some(output.into());
        self
    }

    pub fn with_all_targets(mut self, all_targets: bool) -> Self {
        self.all_targets = all_targets;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// What one deploy invocation produced.
#[derive(Debug)]
pub struct DeployReport {
    /// Version every upload of this invocation used.
    pub version: String,
    /// Total bytes of archive data built or read.
    pub archive_size: usize,
    /// Where the archive was written; set only for build-only runs.
    pub archive_path: Option<PathBuf>,
    /// Upload outcome per pair; empty for build-only runs.
    pub outcomes: Batch<Deployed>,
}

/// Builds the project archive and uploads it as a new version.
pub struct DeployCommand {
    context: CommandContext,
}

impl DeployCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(CommandContext::with_defaults()?))
    }

    pub fn execute(&self, options: &DeployOptions) -> anyhow::Result<DeployReport> {
        let config = self.context.config()?;
        let version = version::derive(self.context.project_root(), options.version.as_deref());

        if let Some(output) = &options.build_only {
            let project = resolve::resolve_local_project(config, options.project.as_deref())?;
            let archive = self.build_archive(config, &project, &version, Some(output))?;
            archive.write_to(output)?;
            tracing::info!(
                path = %output.display(),
                version = %version,
                size = archive.len(),
                "archive written"
            );
            return Ok(DeployReport {
                version,
                archive_size: archive.len(),
                archive_path: Some(output.clone()),
                outcomes: Batch::empty(),
            });
        }

        let pairs: Vec<DeployPair> = resolve::select_pairs(
            config,
            options.target.as_deref(),
            options.project.as_deref(),
            options.all_targets,
        )?
        .into_iter()
        .map(DeployPair::from)
        .collect();

        // One archive per distinct project name; with a shared project
        // every target reuses the same bytes.
        let mut archives: BTreeMap<String, Archive> = BTreeMap::new();
        for pair in &pairs {
            if archives.contains_key(&pair.project) {
                continue;
            }
            let archive = match &options.archive {
                Some(path) => Archive::from_file(path, &pair.project, &version)?,
                None => self.build_archive(config, &pair.project, &version, None)?,
            };
            archives.insert(pair.project.clone(), archive);
        }
        let archive_size = archives.values().map(Archive::len).sum();

        let client = self.context.api_client()?;
        let dispatcher = Dispatcher::new(options.concurrency);
        let runtime = self.context.runtime()?;
        let archives = Arc::new(archives);
        let upload_version = version.clone();

        let outcomes = runtime.block_on(dispatcher.run(pairs, move |pair| {
            let client = client.clone();
            let archives = Arc::clone(&archives);
            let version = upload_version.clone();
            async move {
                let Some(archive) = archives.get(&pair.project) else {
                    return Err(ApiError::Protocol {
                        url: pair.target.url.to_string(),
                        detail: format!("no archive built for project '{}'", pair.project),
                    });
                };
                client
                    .add_version(
                        &pair.target,
                        &pair.project,
                        &version,
                        archive.bytes().to_vec(),
                    )
                    .await
            }
        }));

        Ok(DeployReport {
            version,
            archive_size,
            archive_path: None,
            outcomes,
        })
    }

    fn build_archive(
        &self,
        config: &GantryConfig,
        project: &str,
        version: &str,
        output: Option<&Path>,
    ) -> Result<Archive, BuildError> {
        let package = config.build.package.as_deref().unwrap_or(project);
        let mut builder = ArchiveBuilder::new(self.context.project_root(), package)
            .excludes(config.build.exclude.iter().cloned());
        if let Some(output) = output {
            builder = builder.skip_path(output);
        }
        builder.build(version)
    }
}
