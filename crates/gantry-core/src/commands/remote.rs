//! Commands against already-deployed projects: schedule, inspect,
//! cancel, delete.
//!
//! Single-shot operations (schedule, cancel, the deletes) resolve one
//! pair and return the payload directly. Listings can fan out across
//! every configured target and come back as a [`Batch`].

use crate::api::{
    Cancelled, JobList, ProjectList, Removed, Scheduled, ScheduleRequest, SpiderList, VersionList,
};
use crate::config::resolve;
use crate::dispatch::{Batch, DeployPair, Dispatcher};

use super::context::CommandContext;

/// Options for scheduling one spider run.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    spider: String,
    target: Option<String>,
    project: Option<String>,
    version: Option<String>,
    settings: Vec<String>,
    args: Vec<(String, String)>,
}

impl ScheduleOptions {
    pub fn new(spider: impl Into<String>) -> Self {
        Self {
            spider: spider.into(),
            target: None,
            project: None,
            version: None,
            settings: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Run this deployed version instead of the latest.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a `KEY=VALUE` setting override.
    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.settings.push(setting.into());
        self
    }

    /// Add a spider argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((key.into(), value.into()));
        self
    }
}

/// Options for cancelling one job.
#[derive(Debug, Clone)]
pub struct CancelOptions {
    job: String,
    target: Option<String>,
    project: Option<String>,
}

impl CancelOptions {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            target: None,
            project: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// Options shared by the listing commands.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    target: Option<String>,
    project: Option<String>,
    /// Deployed version to inspect; only the spider listing uses it.
    version: Option<String>,
    all_targets: bool,
    concurrency: usize,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            target: None,
            project: None,
            version: None,
            all_targets: false,
            concurrency: 1,
        }
    }
}

impl ListingOptions {
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

    pub fn with_all_targets(mut self, all_targets: bool) -> Self {
        self.all_targets = all_targets;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Options for deleting one deployed version.
#[derive(Debug, Clone)]
pub struct DeleteVersionOptions {
    version: String,
    target: Option<String>,
    project: Option<String>,
}

impl DeleteVersionOptions {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            target: None,
            project: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// Options for deleting a whole project.
#[derive(Debug, Clone, Default)]
pub struct DeleteProjectOptions {
    target: Option<String>,
    project: Option<String>,
}

impl DeleteProjectOptions {
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
}

/// Talks to deployed projects on one or many targets.
pub struct RemoteCommand {
    context: CommandContext,
}

impl RemoteCommand {
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Ok(Self::new(CommandContext::with_defaults()?))
    }

    /// Schedule a spider run; the service answers with the job id.
    pub fn schedule(&self, options: &ScheduleOptions) -> anyhow::Result<Scheduled> {
        let config = self.context.config()?;
        let (target, project) = resolve::resolve_pair(
            config,
            options.target.as_deref(),
            options.project.as_deref(),
        )?;
        let request = ScheduleRequest {
            version: options.version.clone(),
            settings: options.settings.clone(),
            args: options.args.clone(),
        };
        let client = self.context.api_client()?;
        let runtime = self.context.runtime()?;
        let scheduled =
            runtime.block_on(client.schedule(&target, &project, &options.spider, &request))?;
        tracing::info!(
            jobid = %scheduled.jobid,
            spider = %options.spider,
            target = %target.name,
            "spider scheduled"
        );
        Ok(scheduled)
    }

    pub fn cancel(&self, options: &CancelOptions) -> anyhow::Result<Cancelled> {
        let config = self.context.config()?;
        let (target, project) = resolve::resolve_pair(
            config,
            options.target.as_deref(),
            options.project.as_deref(),
        )?;
        let client = self.context.api_client()?;
        let runtime = self.context.runtime()?;
        let cancelled = runtime.block_on(client.cancel(&target, &project, &options.job))?;
        tracing::info!(job = %options.job, target = %target.name, "job cancelled");
        Ok(cancelled)
    }

    /// Projects known to each selected target. Needs no project of its
    /// own, so pairs carry the target only.
    pub fn list_projects(&self, options: &ListingOptions) -> anyhow::Result<Batch<ProjectList>> {
        let config = self.context.config()?;
        let pairs: Vec<DeployPair> =
            resolve::select_targets(config, options.target.as_deref(), options.all_targets)?
                .into_iter()
                .map(|target| DeployPair::new(target, ""))
                .collect();

        self.fan_out(options.concurrency, pairs, move |client, pair| async move {
            client.list_projects(&pair.target).await
        })
    }

    pub fn list_versions(&self, options: &ListingOptions) -> anyhow::Result<Batch<VersionList>> {
        let pairs = self.pairs(options)?;
        self.fan_out(options.concurrency, pairs, move |client, pair| async move {
            client.list_versions(&pair.target, &pair.project).await
        })
    }

    pub fn list_spiders(&self, options: &ListingOptions) -> anyhow::Result<Batch<SpiderList>> {
        let pairs = self.pairs(options)?;
        let version = options.version.clone();
        self.fan_out(options.concurrency, pairs, move |client, pair| {
            let version = version.clone();
            async move {
                client
                    .list_spiders(&pair.target, &pair.project, version.as_deref())
                    .await
            }
        })
    }

    pub fn list_jobs(&self, options: &ListingOptions) -> anyhow::Result<Batch<JobList>> {
        let pairs = self.pairs(options)?;
        self.fan_out(options.concurrency, pairs, move |client, pair| async move {
            client.list_jobs(&pair.target, &pair.project).await
        })
    }

    pub fn delete_version(&self, options: &DeleteVersionOptions) -> anyhow::Result<Removed> {
        let config = self.context.config()?;
        let (target, project) = resolve::resolve_pair(
            config,
            options.target.as_deref(),
            options.project.as_deref(),
        )?;
        let client = self.context.api_client()?;
        let runtime = self.context.runtime()?;
        let removed =
            runtime.block_on(client.delete_version(&target, &project, &options.version))?;
        tracing::info!(
            project = %project,
            version = %options.version,
            target = %target.name,
            "version deleted"
        );
        Ok(removed)
    }

    pub fn delete_project(&self, options: &DeleteProjectOptions) -> anyhow::Result<Removed> {
        let config = self.context.config()?;
        let (target, project) = resolve::resolve_pair(
            config,
            options.target.as_deref(),
            options.project.as_deref(),
        )?;
        let client = self.context.api_client()?;
        let runtime = self.context.runtime()?;
        let removed = runtime.block_on(client.delete_project(&target, &project))?;
        tracing::info!(project = %project, target = %target.name, "project deleted");
        Ok(removed)
    }

    fn pairs(&self, options: &ListingOptions) -> anyhow::Result<Vec<DeployPair>> {
        let config = self.context.config()?;
        let pairs = resolve::select_pairs(
            config,
            options.target.as_deref(),
            options.project.as_deref(),
            options.all_targets,
        )?;
        Ok(pairs.into_iter().map(DeployPair::from).collect())
    }

    fn fan_out<T, F, Fut>(
        &self,
        concurrency: usize,
        pairs: Vec<DeployPair>,
        op: F,
    ) -> anyhow::Result<Batch<T>>
    where
        T: Send + 'static,
        F: Fn(crate::api::ApiClient, DeployPair) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future<Output = Result<T, crate::error::ApiError>> + Send + 'static,
    {
        let client = self.context.api_client()?;
        let dispatcher = Dispatcher::new(concurrency);
        let runtime = self.context.runtime()?;
        let batch = runtime.block_on(dispatcher.run(pairs, move |pair| {
            let client = client.clone();
            op.clone()(client, pair)
        }));
        Ok(batch)
    }
}
