//! depbot - dependency update bot
//!
//! ## Commands
//!
//! - `reconcile`: run one reconciliation pass against a GitHub repository
//! - `plan`: show the groups and branches a pass would work on
//! - `classify`: classify a single version bump

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};

use depbot_core::scan::ScanFailure;
use depbot_core::telemetry::init_tracing;
use depbot_core::{
    admit, branch_name, classify, collect_candidates, group_updates, is_upgrade,
    CandidateUpdate, DefaultRenderer, DependencySource, DryRunPlatform, GitWorkspace,
    JsonFileSource, Platform, ReconciliationConfig, ReconciliationReport, Reconciler, Renderer,
    Workspace,
};
use depbot_github::config::DEFAULT_API_URL;
use depbot_github::{GitHubClient, GitHubConfig, GitHubPlatform};

#[derive(Parser)]
#[command(name = "depbot")]
#[command(version = depbot_core::VERSION)]
#[command(about = "Keeps dependency update pull requests in sync with the latest scan", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass
    Reconcile {
        /// Scanner output files (JSON arrays of updates)
        #[arg(short, long = "updates", required = true, num_args = 1..)]
        updates: Vec<PathBuf>,

        /// Configuration file
        #[arg(short, long, default_value = "depbot.toml")]
        config: PathBuf,

        /// Repository as owner/name
        #[arg(short, long)]
        repo: String,

        /// API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Local clone of the repository
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// REST API root
        #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Log writes instead of performing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the groups and branches a pass would work on
    Plan {
        /// Scanner output files (JSON arrays of updates)
        #[arg(short, long = "updates", required = true, num_args = 1..)]
        updates: Vec<PathBuf>,

        /// Configuration file
        #[arg(short, long, default_value = "depbot.toml")]
        config: PathBuf,
    },

    /// Classify a version bump
    Classify {
        /// Installed version
        current: String,

        /// Proposed version
        latest: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Reconcile {
            updates,
            config,
            repo,
            token,
            workdir,
            api_url,
            dry_run,
        } => {
            let config = load_config(&config)?;
            let github = GitHubConfig::new(&api_url, &repo)
                .context("Invalid --repo")?;
            let github = match token {
                Some(token) => github.with_token(&token),
                None => github,
            };
            cmd_reconcile(&updates, config, github, &workdir, dry_run, cli.json).await
        }
        Commands::Plan { updates, config } => {
            let config = load_config(&config)?;
            cmd_plan(&updates, &config, cli.json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Classify { current, latest } => {
            cmd_classify(&current, &latest, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: &Path) -> Result<ReconciliationConfig> {
    ReconciliationConfig::load(path)
        .with_context(|| format!("Failed to load config from {:?}", path))
}

/// Scan every updates file concurrently.
async fn load_candidates(paths: &[PathBuf]) -> (Vec<CandidateUpdate>, Vec<ScanFailure>) {
    let sources: Vec<Arc<dyn DependencySource>> = paths
        .iter()
        .map(|p| Arc::new(JsonFileSource::new(p)) as Arc<dyn DependencySource>)
        .collect();
    let outcome = collect_candidates(&sources).await;
    (outcome.updates, outcome.failures)
}

async fn cmd_reconcile(
    paths: &[PathBuf],
    mut config: ReconciliationConfig,
    github: GitHubConfig,
    workdir: &Path,
    dry_run: bool,
    json: bool,
) -> Result<ExitCode> {
    let checkout = GitWorkspace::open(workdir)
        .with_context(|| format!("{:?} is not a git checkout", workdir))?;
    if let Err(e) = checkout.fetch() {
        warn!(error = %e, "fetch failed, comparing against stale remote refs");
    }

    let (updates, scan_failures) = load_candidates(paths).await;
    if !scan_failures.is_empty() && config.close_unmatched {
        // Packages from a failed source look satisfied to the sweep.
        warn!(
            failures = scan_failures.len(),
            "scan incomplete, skipping the unmatched sweep this pass"
        );
        config.close_unmatched = false;
    }

    let client = GitHubClient::new(github).context("Failed to create GitHub client")?;
    let mut platform: Arc<dyn Platform> =
        Arc::new(GitHubPlatform::new(client, checkout.clone()));
    if dry_run {
        info!("dry run: no writes will be performed");
        platform = Arc::new(DryRunPlatform::new(platform));
    }

    let mut report = run_pass(platform, Arc::new(checkout), &updates, &config).await?;
    report.scan_failures = scan_failures;

    print_report(&report, json)?;
    Ok(if report.is_success() && report.scan_failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_pass(
    platform: Arc<dyn Platform>,
    workspace: Arc<dyn Workspace>,
    updates: &[CandidateUpdate],
    config: &ReconciliationConfig,
) -> Result<ReconciliationReport> {
    let reconciler = Reconciler::new(platform, workspace, Arc::new(DefaultRenderer::default()));
    reconciler
        .reconcile(updates, config)
        .await
        .context("Reconciliation pass aborted")
}

fn print_report(report: &ReconciliationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.render_markdown());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct PlannedGroup {
    name: String,
    branch: String,
    title: String,
    update_type: String,
    packages: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Plan {
    groups: Vec<PlannedGroup>,
    dropped: Vec<String>,
    scan_failures: Vec<ScanFailure>,
}

fn build_plan(updates: &[CandidateUpdate], config: &ReconciliationConfig) -> Result<Plan> {
    config.validate().context("Invalid configuration")?;
    let (admitted, dropped) = admit(updates, config)?;
    let renderer = DefaultRenderer::default();

    let groups = group_updates(&admitted, config)?
        .into_iter()
        .map(|group| PlannedGroup {
            branch: branch_name(&group.name, &config.bot.branch_prefix),
            title: renderer.render_title(&group),
            update_type: group.update_type.to_string(),
            packages: group
                .updates
                .iter()
                .map(|u| format!("{} {} -> {}", u.name, u.current_version, u.new_version))
                .collect(),
            name: group.name,
        })
        .collect();

    Ok(Plan {
        groups,
        dropped: dropped
            .iter()
            .map(|d| format!("{} ({})", d.update.name, d.reason))
            .collect(),
        scan_failures: Vec::new(),
    })
}

async fn cmd_plan(paths: &[PathBuf], config: &ReconciliationConfig, json: bool) -> Result<()> {
    let (updates, scan_failures) = load_candidates(paths).await;
    let mut plan = build_plan(&updates, config)?;
    plan.scan_failures = scan_failures;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.groups.is_empty() {
        println!("No updates to apply.");
    }
    for group in &plan.groups {
        println!("{} [{}]", group.name, group.update_type);
        println!("  branch: {}", group.branch);
        println!("  title:  {}", group.title);
        for package in &group.packages {
            println!("  - {}", package);
        }
        println!();
    }
    if !plan.dropped.is_empty() {
        println!("Dropped:");
        for d in &plan.dropped {
            println!("  - {}", d);
        }
    }
    for failure in &plan.scan_failures {
        println!("Scan failed: {}: {}", failure.source, failure.error);
    }
    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
struct Classification {
    current: String,
    latest: String,
    update_type: String,
    upgrade: bool,
}

fn classify_pair(current: &str, latest: &str) -> Classification {
    Classification {
        current: current.to_string(),
        latest: latest.to_string(),
        update_type: classify(current, latest).to_string(),
        upgrade: is_upgrade(current, latest),
    }
}

fn cmd_classify(current: &str, latest: &str, json: bool) -> Result<()> {
    let c = classify_pair(current, latest);
    if json {
        println!("{}", serde_json::to_string_pretty(&c)?);
    } else if c.upgrade {
        println!("{} -> {}: {}", c.current, c.latest, c.update_type);
    } else {
        println!("{} -> {}: not an upgrade", c.current, c.latest);
    }
    Ok(())
}
