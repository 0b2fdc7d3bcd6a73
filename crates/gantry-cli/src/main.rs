//! Gantry - deploy crawling projects to remote runner services
//!
//! Usage:
//!   gantry deploy              # Package the project and upload it
//!   gantry build out.zip       # Write the archive without uploading
//!   gantry schedule <SPIDER>   # Schedule a spider run
//!   gantry jobs                # Pending, running and finished jobs
//!   gantry targets             # Show configured targets

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gantry_core::api::{Job, JobList};
use gantry_core::commands::{
    CancelOptions, CommandContext, DeleteProjectOptions, DeleteVersionOptions, DeployCommand,
    DeployOptions, DeployReport, ListingOptions, RemoteCommand, ScheduleOptions, targets_overview,
};
use gantry_core::dispatch::Batch;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Deploy crawling projects and drive their spiders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the project and upload it as a new version
    Deploy {
        /// Target to deploy to (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project name on the target
        #[arg(short, long)]
        project: Option<String>,

        /// Version identifier (defaults to the VCS state, then a timestamp)
        #[arg(long)]
        version: Option<String>,

        /// Upload this prebuilt archive instead of packaging
        #[arg(long, value_name = "FILE")]
        archive: Option<PathBuf>,

        /// Write the archive to this file and skip the upload
        #[arg(long, value_name = "FILE", conflicts_with = "archive")]
        build_only: Option<PathBuf>,

        /// Deploy to every configured target
        #[arg(short = 'a', long, conflicts_with = "target")]
        all_targets: bool,

        /// Parallel uploads when deploying to several targets
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Write the project archive to a file without uploading
    Build {
        /// Where to write the archive
        output: PathBuf,

        /// Project name recorded in the archive manifest
        #[arg(short, long)]
        project: Option<String>,

        /// Version identifier (defaults to the VCS state, then a timestamp)
        #[arg(long)]
        version: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show configured targets
    Targets {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List projects known to a target
    Projects {
        /// Target to query (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Query every configured target
        #[arg(short = 'a', long, conflicts_with = "target")]
        all_targets: bool,

        /// Parallel requests when querying several targets
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List deployed versions of a project
    Versions {
        /// Target to query (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project to inspect
        #[arg(short, long)]
        project: Option<String>,

        /// Query every configured target
        #[arg(short = 'a', long, conflicts_with = "target")]
        all_targets: bool,

        /// Parallel requests when querying several targets
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List spiders in a deployed project
    Spiders {
        /// Target to query (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project to inspect
        #[arg(short, long)]
        project: Option<String>,

        /// Inspect this deployed version instead of the latest
        #[arg(long)]
        version: Option<String>,

        /// Query every configured target
        #[arg(short = 'a', long, conflicts_with = "target")]
        all_targets: bool,

        /// Parallel requests when querying several targets
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List pending, running and finished jobs of a project
    Jobs {
        /// Target to query (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project to inspect
        #[arg(short, long)]
        project: Option<String>,

        /// Query every configured target
        #[arg(short = 'a', long, conflicts_with = "target")]
        all_targets: bool,

        /// Parallel requests when querying several targets
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Schedule a spider run
    Schedule {
        /// Spider to run
        spider: String,

        /// Spider arguments as KEY=VALUE
        #[arg(value_name = "KEY=VALUE")]
        args: Vec<String>,

        /// Target to schedule on (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project the spider belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Run this deployed version instead of the latest
        #[arg(long)]
        spider_version: Option<String>,

        /// Setting override as NAME=value (repeatable)
        #[arg(short, long, value_name = "NAME=value")]
        setting: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Cancel a job
    Cancel {
        /// Job id to cancel
        job: String,

        /// Target the job runs on (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project the job belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove one deployed version of a project
    DeleteVersion {
        /// Version to remove
        version: String,

        /// Target to remove it from (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project the version belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove a project and every deployed version of it
    DeleteProject {
        /// Target to remove it from (defaults to the sole configured target)
        #[arg(short, long)]
        target: Option<String>,

        /// Project to remove
        #[arg(short, long)]
        project: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Failures only, exit code carries the result
    Quiet,
}

fn main() -> Result<()> {
    // Initialize tracing; logs go to stderr so table and JSON output stay
    // pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run_cli(cli.command)
}

fn run_cli(command: Commands) -> Result<()> {
    match command {
        Commands::Deploy {
            target,
            project,
            version,
            archive,
            build_only,
            all_targets,
            concurrency,
            format,
        } => run_deploy(
            target,
            project,
            version,
            archive,
            build_only,
            all_targets,
            concurrency,
            format,
        ),
        Commands::Build {
            output,
            project,
            version,
            format,
        } => run_build(output, project, version, format),
        Commands::Targets { format } => run_targets(format),
        Commands::Projects {
            target,
            all_targets,
            concurrency,
            format,
        } => run_projects(target, all_targets, concurrency, format),
        Commands::Versions {
            target,
            project,
            all_targets,
            concurrency,
            format,
        } => run_versions(target, project, all_targets, concurrency, format),
        Commands::Spiders {
            target,
            project,
            version,
            all_targets,
            concurrency,
            format,
        } => run_spiders(target, project, version, all_targets, concurrency, format),
        Commands::Jobs {
            target,
            project,
            all_targets,
            concurrency,
            format,
        } => run_jobs(target, project, all_targets, concurrency, format),
        Commands::Schedule {
            spider,
            args,
            target,
            project,
            spider_version,
            setting,
            format,
        } => run_schedule(spider, args, target, project, spider_version, setting, format),
        Commands::Cancel {
            job,
            target,
            project,
            format,
        } => run_cancel(job, target, project, format),
        Commands::DeleteVersion {
            version,
            target,
            project,
            format,
        } => run_delete_version(version, target, project, format),
        Commands::DeleteProject {
            target,
            project,
            format,
        } => run_delete_project(target, project, format),
    }
}

// =============================================================================
// Command runners
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn run_deploy(
    target: Option<String>,
    project: Option<String>,
    version: Option<String>,
    archive: Option<PathBuf>,
    build_only: Option<PathBuf>,
    all_targets: bool,
    concurrency: usize,
    format: OutputFormat,
) -> Result<()> {
    // Build deploy options
    let mut options = DeployOptions::new()
        .with_all_targets(all_targets)
        .with_concurrency(concurrency);
    if let Some(target) = target {
        options = options.with_target(target);
    }
    if let Some(project) = project {
        options = options.with_project(project);
    }
    if let Some(version) = version {
        options = options.with_version(version);
    }
    if let Some(archive) = archive {
        options = options.with_archive(archive);
    }
    if let Some(output) = build_only {
        options = options.with_build_only(output);
    }

    let cmd = DeployCommand::with_defaults()?;
    let report = cmd.execute(&options)?;

    match format {
        OutputFormat::Table => print_deploy_table(&report),
        OutputFormat::Json => print_deploy_json(&report)?,
        OutputFormat::Quiet => print_failures(&report.outcomes),
    }
    if !report.outcomes.ok() {
        std::process::exit(1);
    }

    Ok(())
}

fn run_build(
    output: PathBuf,
    project: Option<String>,
    version: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = DeployOptions::new().with_build_only(output);
    if let Some(project) = project {
        options = options.with_project(project);
    }
    if let Some(version) = version {
        options = options.with_version(version);
    }

    let cmd = DeployCommand::with_defaults()?;
    let report = cmd.execute(&options)?;

    match format {
        OutputFormat::Table => print_deploy_table(&report),
        OutputFormat::Json => print_deploy_json(&report)?,
        OutputFormat::Quiet => {}
    }

    Ok(())
}

fn run_targets(format: OutputFormat) -> Result<()> {
    let context = CommandContext::with_defaults()?;
    let rows = targets_overview(context.config()?);

    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No targets configured.");
                println!("Add a [target.<name>] section to gantry.toml to get started.");
                return Ok(());
            }
            println!("{:<18} {:<42} Project", "Target", "URL");
            println!("{}", "-".repeat(76));
            for row in &rows {
                println!(
                    "{:<18} {:<42} {}",
                    row.name,
                    row.url.as_deref().unwrap_or("-"),
                    row.project.as_deref().unwrap_or("-")
                );
            }
        }
        OutputFormat::Json => {
            let targets: Vec<_> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "name": row.name,
                        "url": row.url,
                        "project": row.project,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&targets)?);
        }
        OutputFormat::Quiet => {}
    }

    Ok(())
}

fn run_projects(
    target: Option<String>,
    all_targets: bool,
    concurrency: usize,
    format: OutputFormat,
) -> Result<()> {
    let options = listing_options(target, None, None, all_targets, concurrency);
    let cmd = RemoteCommand::with_defaults()?;
    let batch = cmd.list_projects(&options)?;

    match format {
        OutputFormat::Table => print_list_table(&batch, "projects", |list| &list.projects),
        OutputFormat::Json => {
            let output = batch_results(&batch, |list| {
                serde_json::json!({ "projects": list.projects })
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => print_failures(&batch),
    }
    if !batch.ok() {
        std::process::exit(1);
    }

    Ok(())
}

fn run_versions(
    target: Option<String>,
    project: Option<String>,
    all_targets: bool,
    concurrency: usize,
    format: OutputFormat,
) -> Result<()> {
    let options = listing_options(target, project, None, all_targets, concurrency);
    let cmd = RemoteCommand::with_defaults()?;
    let batch = cmd.list_versions(&options)?;

    match format {
        OutputFormat::Table => print_list_table(&batch, "versions", |list| &list.versions),
        OutputFormat::Json => {
            let output = batch_results(&batch, |list| {
                serde_json::json!({ "versions": list.versions })
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => print_failures(&batch),
    }
    if !batch.ok() {
        std::process::exit(1);
    }

    Ok(())
}

fn run_spiders(
    target: Option<String>,
    project: Option<String>,
    version: Option<String>,
    all_targets: bool,
    concurrency: usize,
    format: OutputFormat,
) -> Result<()> {
    let options = listing_options(target, project, version, all_targets, concurrency);
    let cmd = RemoteCommand::with_defaults()?;
    let batch = cmd.list_spiders(&options)?;

    match format {
        OutputFormat::Table => print_list_table(&batch, "spiders", |list| &list.spiders),
        OutputFormat::Json => {
            let output = batch_results(&batch, |list| {
                serde_json::json!({ "spiders": list.spiders })
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => print_failures(&batch),
    }
    if !batch.ok() {
        std::process::exit(1);
    }

    Ok(())
}

fn run_jobs(
    target: Option<String>,
    project: Option<String>,
    all_targets: bool,
    concurrency: usize,
    format: OutputFormat,
) -> Result<()> {
    let options = listing_options(target, project, None, all_targets, concurrency);
    let cmd = RemoteCommand::with_defaults()?;
    let batch = cmd.list_jobs(&options)?;

    match format {
        OutputFormat::Table => print_jobs_table(&batch),
        OutputFormat::Json => {
            let output = batch_results(&batch, |jobs| {
                serde_json::json!({
                    "pending": jobs.pending,
                    "running": jobs.running,
                    "finished": jobs.finished,
                })
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => print_failures(&batch),
    }
    if !batch.ok() {
        std::process::exit(1);
    }

    Ok(())
}

fn run_schedule(
    spider: String,
    args: Vec<String>,
    target: Option<String>,
    project: Option<String>,
    spider_version: Option<String>,
    settings: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = ScheduleOptions::new(&spider);
    if let Some(target) = target {
        options = options.with_target(target);
    }
    if let Some(project) = project {
        options = options.with_project(project);
    }
    if let Some(version) = spider_version {
        options = options.with_version(version);
    }
    for setting in settings {
        if !setting.contains('=') {
            anyhow::bail!("Invalid setting '{setting}': expected NAME=value");
        }
        options = options.with_setting(setting);
    }
    for arg in &args {
        let (key, value) = parse_key_value(arg)?;
        options = options.with_arg(key, value);
    }

    let cmd = RemoteCommand::with_defaults()?;
    let scheduled = cmd.schedule(&options)?;

    match format {
        OutputFormat::Table => println!("✓ Scheduled '{spider}' as job {}", scheduled.jobid),
        OutputFormat::Json => {
            let output = serde_json::json!({ "jobid": scheduled.jobid });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }

    Ok(())
}

fn run_cancel(
    job: String,
    target: Option<String>,
    project: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = CancelOptions::new(&job);
    if let Some(target) = target {
        options = options.with_target(target);
    }
    if let Some(project) = project {
        options = options.with_project(project);
    }

    let cmd = RemoteCommand::with_defaults()?;
    let cancelled = cmd.cancel(&options)?;

    match format {
        OutputFormat::Table => match &cancelled.prevstate {
            Some(state) => println!("✓ Cancelled job {job} (was {state})"),
            None => println!("✓ Cancelled job {job}"),
        },
        OutputFormat::Json => {
            let output = serde_json::json!({
                "job": job,
                "prevstate": cancelled.prevstate,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }

    Ok(())
}

fn run_delete_version(
    version: String,
    target: Option<String>,
    project: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = DeleteVersionOptions::new(&version);
    if let Some(target) = target {
        options = options.with_target(target);
    }
    if let Some(project) = project {
        options = options.with_project(project);
    }

    let cmd = RemoteCommand::with_defaults()?;
    cmd.delete_version(&options)?;

    match format {
        OutputFormat::Table => println!("✓ Deleted version {version}"),
        OutputFormat::Json => {
            let output = serde_json::json!({ "deleted": version });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }

    Ok(())
}

fn run_delete_project(
    target: Option<String>,
    project: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = DeleteProjectOptions::new();
    if let Some(target) = target {
        options = options.with_target(target);
    }
    if let Some(project) = project.clone() {
        options = options.with_project(project);
    }

    let cmd = RemoteCommand::with_defaults()?;
    cmd.delete_project(&options)?;

    match format {
        OutputFormat::Table => match &project {
            Some(project) => println!("✓ Deleted project '{project}'"),
            None => println!("✓ Project deleted"),
        },
        OutputFormat::Json => {
            let output = serde_json::json!({ "deleted": project });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {}
    }

    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_deploy_table(report: &DeployReport) {
    if let Some(path) = &report.archive_path {
        println!(
            "✓ Wrote {} (version {}, {} bytes)",
            path.display(),
            report.version,
            report.archive_size
        );
        return;
    }
    println!(
        "Deploying version {} ({} bytes)",
        report.version, report.archive_size
    );
    for (key, outcome) in report.outcomes.iter() {
        match outcome {
            Ok(deployed) => println!("  ✓ {key} ({} spiders)", deployed.spiders),
            Err(err) => println!("  ✗ {key}: {err}"),
        }
    }
    if report.outcomes.failed() > 0 {
        println!(
            "{} of {} uploads failed",
            report.outcomes.failed(),
            report.outcomes.len()
        );
    }
}

fn print_deploy_json(report: &DeployReport) -> Result<()> {
    let mut output = batch_results(&report.outcomes, |deployed| {
        serde_json::json!({ "spiders": deployed.spiders })
    });
    output["version"] = report.version.clone().into();
    output["archive_size"] = report.archive_size.into();
    output["archive_path"] = serde_json::json!(&report.archive_path);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_list_table<T>(batch: &Batch<T>, noun: &str, items: impl Fn(&T) -> &[String]) {
    for (key, outcome) in batch.iter() {
        match outcome {
            Ok(payload) => {
                let names = items(payload);
                println!("{key}: {} {noun}", names.len());
                for name in names {
                    println!("  {name}");
                }
            }
            Err(err) => println!("{key}: ✗ {err}"),
        }
    }
}

fn print_jobs_table(batch: &Batch<JobList>) {
    for (key, outcome) in batch.iter() {
        match outcome {
            Ok(jobs) => {
                println!("{key}: {} jobs", jobs.total());
                if jobs.total() > 0 {
                    println!("  {:<9} {:<34} {:<20} Times", "State", "Job", "Spider");
                    println!("  {}", "-".repeat(76));
                }
                print_job_rows("pending", &jobs.pending);
                print_job_rows("running", &jobs.running);
                print_job_rows("finished", &jobs.finished);
            }
            Err(err) => println!("{key}: ✗ {err}"),
        }
    }
}

fn print_job_rows(state: &str, jobs: &[Job]) {
    for job in jobs {
        println!(
            "  {:<9} {:<34} {:<20} {}",
            state,
            job.id,
            job.spider,
            format_job_times(job)
        );
    }
}

fn print_failures<T>(batch: &Batch<T>) {
    for (key, outcome) in batch.iter() {
        if let Err(err) = outcome {
            println!("{key}: {err}");
        }
    }
}

/// Per-pair results plus an overall flag, shared by every batch command.
fn batch_results<T>(
    batch: &Batch<T>,
    payload: impl Fn(&T) -> serde_json::Value,
) -> serde_json::Value {
    let results: Vec<_> = batch
        .iter()
        .map(|(key, outcome)| {
            let mut entry = serde_json::json!({
                "target": key.target,
                "ok": outcome.is_ok(),
            });
            if !key.project.is_empty() {
                entry["project"] = key.project.clone().into();
            }
            match outcome {
                Ok(value) => entry["result"] = payload(value),
                Err(err) => entry["error"] = err.to_string().into(),
            }
            entry
        })
        .collect();
    serde_json::json!({ "ok": batch.ok(), "results": results })
}

// =============================================================================
// Helpers
// =============================================================================

fn listing_options(
    target: Option<String>,
    project: Option<String>,
    version: Option<String>,
    all_targets: bool,
    concurrency: usize,
) -> ListingOptions {
    let mut options = ListingOptions::new()
        .with_all_targets(all_targets)
        .with_concurrency(concurrency);
    if let Some(target) = target {
        options = options.with_target(target);
    }
    if let Some(project) = project {
        options = options.with_project(project);
    }
    if let Some(version) = version {
        options = options.with_version(version);
    }
    options
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => anyhow::bail!("Invalid argument '{raw}': expected KEY=VALUE"),
    }
}

fn format_job_times(job: &Job) -> String {
    match (&job.start_time, &job.end_time) {
        (Some(start), Some(end)) => format!("{start} .. {end}"),
        (Some(start), None) => format!("started {start}"),
        _ => String::from("-"),
    }
}
