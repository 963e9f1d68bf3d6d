//! Suspended-account alerts.
//!
//! Renders a [`SuspendedTree`] as plain text and posts it to a
//! Discord-compatible webhook. Dispatch failures are logged and swallowed
//! so a run never fails because of its notification.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::reconcile::SuspendedTree;

/// First line of every alert.
pub const ALERT_HEADER: &str = "\u{1f6a8} Suspended Accounts Alert! \u{1f6a8}";

/// Discord rejects message content longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Endpoint the `discord://` shorthand expands to.
const DISCORD_WEBHOOK_BASE: &str = "https://discord.com/api/webhooks";

/// Current package version, set at compile time.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A push-style destination for alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination did not accept the message.
    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

/// Discord-compatible webhook channel.
pub struct WebhookChannel {
    http: reqwest::Client,
    url: reqwest::Url,
}

impl std::fmt::Debug for WebhookChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookChannel")
            .field("host", &self.url.host_str())
            .field("url", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl WebhookChannel {
    /// Create a channel posting to `url`.
    ///
    /// Accepts an http(s) URL or the `discord://{id}/{token}` shorthand.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is unusable or the HTTP client cannot be
    /// built.
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = parse_webhook_url(url)?;
        let http = reqwest::Client::builder()
            .user_agent(format!("ghwatch/{VERSION}"))
            .timeout(timeout)
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self { http, url })
    }
}

/// Resolve a webhook URL, expanding `discord://{id}/{token}` to the
/// Discord API endpoint.
///
/// # Errors
///
/// Returns an error if the result is not an http(s) URL. Error messages
/// never include the URL, which embeds the webhook secret.
pub fn parse_webhook_url(raw: &str) -> anyhow::Result<reqwest::Url> {
    let raw = raw.trim();
    let expanded = match raw.strip_prefix("discord://") {
        Some(rest) => {
            let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
            let [id, token] = segments.as_slice() else {
                anyhow::bail!("discord webhook shorthand must be discord://{{id}}/{{token}}");
            };
            format!("{DISCORD_WEBHOOK_BASE}/{id}/{token}")
        }
        None => raw.to_owned(),
    };
    let url = reqwest::Url::parse(&expanded).map_err(|e| anyhow::anyhow!("invalid webhook URL: {e}"))?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "webhook URL must use http, https or discord"
    );
    Ok(url)
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let text = format!("**{title}**\n{body}");
        let chunks = split_message(&text, DISCORD_MESSAGE_LIMIT);
        let total = chunks.len();

        for (idx, chunk) in chunks.iter().enumerate() {
            let response = self
                .http
                .post(self.url.clone())
                .json(&WebhookPayload { content: chunk })
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("webhook request failed: {}", e.without_url()))?;

            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("webhook returned {status}");
            }
            debug!(part = idx, parts = total, "webhook message delivered");
        }
        Ok(())
    }
}

/// Prints alerts to stdout instead of delivering them. Used by `--dry-run`.
#[derive(Debug, Default)]
pub struct StdoutChannel;

#[async_trait]
impl NotificationChannel for StdoutChannel {
    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        println!("{title}\n{body}");
        Ok(())
    }
}

/// Render the alert body for a non-empty tree.
///
/// One header line, then per group a blank line and `"{group}:"`, followed
/// by `"- {project}: {user}, {user}"` for each project.
pub fn render_alert(tree: &SuspendedTree) -> String {
    let mut lines = vec![ALERT_HEADER.to_owned()];
    for group in tree.groups() {
        lines.push(format!("\n{}:", group.name));
        for project in &group.projects {
            lines.push(format!("- {}: {}", project.name, project.usernames.join(", ")));
        }
    }
    lines.join("\n")
}

/// Split `text` into chunks of at most `limit` characters.
///
/// Breaks on line boundaries where possible; a single line longer than
/// `limit` is cut mid-line. Empty lines that would open a chunk are dropped,
/// so no chunk starts with a newline and none is empty unless `text` is.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len: usize = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() {
            line_len
        } else {
            current_len.saturating_add(1).saturating_add(line_len)
        };

        if needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len = needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current_len = 0;

        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let piece: String = chars.by_ref().take(limit).collect();
            let piece_len = piece.chars().count();
            if piece_len == limit && chars.peek().is_some() {
                chunks.push(piece);
            } else {
                current = piece;
                current_len = piece_len;
            }
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Why no alert was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing was suspended.
    NothingSuspended,
    /// `alert_with_details` is off.
    Disabled,
    /// No channel is configured.
    NoChannel,
}

/// What [`Notifier::notify`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// No dispatch was attempted.
    Skipped(SkipReason),
    /// The channel accepted the alert.
    Sent,
    /// Dispatch was attempted and failed; the error was logged.
    Failed,
}

/// Decides whether to alert and dispatches the rendered message.
pub struct Notifier {
    channel: Option<Box<dyn NotificationChannel>>,
    title: String,
}

impl Notifier {
    /// Create a notifier. `channel` is `None` when no destination is configured.
    pub fn new(channel: Option<Box<dyn NotificationChannel>>, title: String) -> Self {
        Self { channel, title }
    }

    /// Whether a destination is configured.
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Send an alert for `tree` if the configuration allows it.
    pub async fn notify(&self, tree: &SuspendedTree, config: &NotificationConfig) -> NotifyOutcome {
        if tree.is_empty() {
            debug!("no suspended accounts, nothing to report");
            return NotifyOutcome::Skipped(SkipReason::NothingSuspended);
        }
        if !config.alert_with_details {
            info!(
                suspended = tree.entry_count(),
                "suspended accounts found but detailed alerts are disabled"
            );
            return NotifyOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(channel) = &self.channel else {
            warn!(
                suspended = tree.entry_count(),
                "suspended accounts found but no notification channel is configured"
            );
            return NotifyOutcome::Skipped(SkipReason::NoChannel);
        };

        let body = render_alert(tree);
        match channel.send(&self.title, &body).await {
            Ok(()) => {
                info!(suspended = tree.entry_count(), "suspended accounts alert sent");
                NotifyOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "failed to send suspended accounts alert");
                NotifyOutcome::Failed
            }
        }
    }
}
