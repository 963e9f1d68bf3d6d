//! Log output for a ghwatch invocation.
//!
//! Human-readable events always go to stderr so stdout stays free for
//! command output (`probe` lines, `--dry-run` reports). With `--log-dir`,
//! every event is also appended as a JSON line to a daily-rotated
//! `ghwatch.log.YYYY-MM-DD`, carrying the enclosing `run` span so lines from
//! one pass share its `run_id`.
//!
//! `RUST_LOG` overrides the default filter.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated log files.
const LOG_FILE_PREFIX: &str = "ghwatch.log";

/// Our events at `info`; HTTP client internals only when they warn.
const DEFAULT_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

/// Keeps the JSON file writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Returns a guard when `log_dir` is given; hold it until the process exits.
///
/// # Errors
///
/// Returns an error if `log_dir` cannot be created or a global subscriber is
/// already installed.
pub fn init(log_dir: Option<&Path>) -> anyhow::Result<Option<LoggingGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create logs directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer);
            (Some(layer), Some(LoggingGuard { _guard: guard }))
        }
        None => (None, None),
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
