//! Run configuration loading and validation.
//!
//! Loads `ghwatch.toml` with per-section defaults. All sections use
//! `#[serde(default)]` so a minimal or empty config file is valid.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Upper bound on attempts per username.
const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Top-level run configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    /// Which alert messages are sent.
    #[serde(default)]
    pub message_types: NotificationConfig,

    /// Status probe tuning.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Notification channel settings.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Gates for outgoing alerts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Send a detailed message listing suspended accounts.
    #[serde(default, alias = "AlertWithDetails")]
    pub alert_with_details: bool,
}

/// Retry, concurrency and endpoint settings for status probes.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Attempts per username before it is classified as an error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts, also used as the rate-limit fallback.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Concurrent probes. Defaults to the available hardware parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding an optional GitHub token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            workers: None,
            api_base: default_api_base(),
            token_env: default_token_env(),
        }
    }
}

impl ProbeConfig {
    /// Pause between attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved worker pool size, never zero.
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
    }
}

/// Notification channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Environment variable holding the webhook URL.
    #[serde(default = "default_webhook_env")]
    pub webhook_env: String,

    /// Title attached to every message.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_env: default_webhook_env(),
            title: default_title(),
        }
    }
}

impl RunConfig {
    /// Validate that configuration values are within sane bounds.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first out-of-range value.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_ATTEMPTS_LIMIT).contains(&self.probe.max_attempts),
            "probe.max_attempts must be in [1, {MAX_ATTEMPTS_LIMIT}]"
        );
        anyhow::ensure!(
            self.probe.request_timeout_secs >= 1,
            "probe.request_timeout_secs must be >= 1"
        );
        anyhow::ensure!(
            self.probe.workers != Some(0),
            "probe.workers must be >= 1 when set"
        );
        let api_base = url::Url::parse(&self.probe.api_base)
            .with_context(|| format!("probe.api_base is not a URL: {}", self.probe.api_base))?;
        anyhow::ensure!(
            matches!(api_base.scheme(), "http" | "https"),
            "probe.api_base must use http or https"
        );
        anyhow::ensure!(
            !self.notify.webhook_env.trim().is_empty(),
            "notify.webhook_env must not be empty"
        );
        Ok(())
    }
}

/// Load run configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_run_config(path: &Path) -> anyhow::Result<RunConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: RunConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

// Default value functions for serde.

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_api_base() -> String {
    "https://api.github.com".to_owned()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_owned()
}

fn default_webhook_env() -> String {
    "DISCORD_WEBHOOK_URL".to_owned()
}

fn default_title() -> String {
    "GitHub Account Status".to_owned()
}
