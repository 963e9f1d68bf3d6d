//! ghwatch CLI entry point.
//!
//! Provides `run`, `probe`, and `validate` subcommands for performing one
//! monitoring pass, checking individual accounts, or checking config files.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use ghwatch::config::{load_run_config, RunConfig};
use ghwatch::credentials::{resolve_credentials, Credentials};
use ghwatch::notify::{Notifier, StdoutChannel};
use ghwatch::probe::{RetryPolicy, StatusProbe};
use ghwatch::roster::{is_valid_username, load_roster};
use ghwatch::run::{build_notifier, build_source, run_once};

/// Default run configuration path, relative to the working directory.
const DEFAULT_CONFIG: &str = "ghwatch.toml";

/// ghwatch: alerts when rostered GitHub accounts are suspended.
#[derive(Parser)]
#[command(name = "ghwatch", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Check every rostered account once and alert on suspensions.
    Run {
        /// Roster of groups, projects and usernames.
        #[arg(long, default_value = "roster.toml")]
        roster: PathBuf,
        /// Run configuration (defaults apply when ghwatch.toml is absent).
        #[arg(long)]
        config: Option<PathBuf>,
        /// `.env` file with the webhook URL and GitHub token.
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// Also write JSON logs to this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,
        /// Print the alert and suspension tree instead of sending.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check individual usernames and print their status.
    Probe {
        /// GitHub logins to check.
        #[arg(required = true)]
        usernames: Vec<String>,
        /// Run configuration (defaults apply when ghwatch.toml is absent).
        #[arg(long)]
        config: Option<PathBuf>,
        /// `.env` file with the GitHub token.
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
    /// Load and validate the roster and run configuration, then exit.
    Validate {
        /// Roster of groups, projects and usernames.
        #[arg(long, default_value = "roster.toml")]
        roster: PathBuf,
        /// Run configuration (defaults apply when ghwatch.toml is absent).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            roster,
            config,
            env_file,
            log_dir,
            dry_run,
        } => {
            handle_run(
                &roster,
                config.as_deref(),
                env_file.as_deref(),
                log_dir.as_deref(),
                dry_run,
            )
            .await
        }
        Command::Probe {
            usernames,
            config,
            env_file,
        } => handle_probe(&usernames, config.as_deref(), env_file.as_deref()).await,
        Command::Validate { roster, config } => handle_validate(&roster, config.as_deref()),
    }
}

/// Perform one monitoring pass.
async fn handle_run(
    roster_path: &Path,
    config_path: Option<&Path>,
    env_file: Option<&Path>,
    log_dir: Option<&Path>,
    dry_run: bool,
) -> anyhow::Result<()> {
    // Keep the guard alive so file logs flush on exit.
    let _logging_guard = ghwatch::logging::init(log_dir)?;

    let config = resolve_config(config_path)?;
    let roster = load_roster(roster_path)?;
    let credentials = load_run_credentials(&config, env_file)?;

    let source = Arc::new(build_source(&config, &credentials)?);
    let notifier = if dry_run {
        Notifier::new(Some(Box::new(StdoutChannel)), config.notify.title.clone())
    } else {
        build_notifier(&config, &credentials)
    };

    info!(
        roster = %roster_path.display(),
        groups = roster.groups.len(),
        projects = roster.project_count(),
        dry_run,
        "starting account check"
    );

    let report = run_once(&roster, &config, source, &notifier).await;

    if dry_run {
        let tree = serde_json::to_string_pretty(&report.reconciliation.suspended)
            .context("failed to serialize suspended accounts")?;
        println!("{tree}");
    }

    info!(notification = ?report.notification, "run finished");
    Ok(())
}

/// Probe individual usernames without notifying.
async fn handle_probe(
    usernames: &[String],
    config_path: Option<&Path>,
    env_file: Option<&Path>,
) -> anyhow::Result<()> {
    ghwatch::logging::init(None)?;

    for username in usernames {
        anyhow::ensure!(
            is_valid_username(username),
            "invalid GitHub username '{username}'"
        );
    }

    let config = resolve_config(config_path)?;
    let credentials = load_run_credentials(&config, env_file)?;
    let source = Arc::new(build_source(&config, &credentials)?);
    let probe = StatusProbe::new(source, RetryPolicy::from(&config.probe));

    for username in usernames {
        let result = probe.probe(username).await;
        println!(
            "{}: {} ({} attempt{})",
            result.username,
            result.status,
            result.attempts,
            if result.attempts == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

/// Validate configuration files and print a short summary.
fn handle_validate(roster_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    ghwatch::logging::init(None)?;

    let config = resolve_config(config_path)?;
    let roster = load_roster(roster_path)?;

    println!(
        "roster ok: {} groups, {} projects, {} distinct usernames",
        roster.groups.len(),
        roster.project_count(),
        roster.usernames().len()
    );
    println!(
        "config ok: alert_with_details={}, max_attempts={}, workers={}",
        config.message_types.alert_with_details,
        config.probe.max_attempts,
        config.probe.worker_count()
    );
    Ok(())
}

/// Load the run configuration.
///
/// An explicit path must exist; the implicit default may be absent.
fn resolve_config(path: Option<&Path>) -> anyhow::Result<RunConfig> {
    match path {
        Some(path) => load_run_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                load_run_config(default)
            } else {
                info!("no {DEFAULT_CONFIG} found, using default configuration");
                Ok(RunConfig::default())
            }
        }
    }
}

fn load_run_credentials(config: &RunConfig, env_file: Option<&Path>) -> anyhow::Result<Credentials> {
    resolve_credentials(
        env_file,
        &[
            config.probe.token_env.as_str(),
            config.notify.webhook_env.as_str(),
        ],
    )
}
