//! One monitoring pass: reconcile the roster, summarise, notify.

use std::sync::Arc;

use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::credentials::Credentials;
use crate::notify::{NotificationChannel, Notifier, NotifyOutcome, WebhookChannel};
use crate::probe::{RetryPolicy, StatusProbe};
use crate::reconcile::{Reconciler, Reconciliation};
use crate::roster::Roster;
use crate::source::github::GitHubSource;
use crate::source::StatusSource;

/// What a pass produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Per-username results and the suspension tree.
    pub reconciliation: Reconciliation,
    /// Whether an alert went out.
    pub notification: NotifyOutcome,
}

/// Build the GitHub status source described by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_source(config: &RunConfig, credentials: &Credentials) -> anyhow::Result<GitHubSource> {
    let token = credentials.get(&config.probe.token_env).map(str::to_owned);
    if token.is_none() {
        info!(
            token_env = %config.probe.token_env,
            "no GitHub token set, using unauthenticated rate limit"
        );
    }
    GitHubSource::new(
        &config.probe.api_base,
        token,
        config.probe.request_timeout(),
    )
}

/// Build the notifier described by `config`.
///
/// A missing or unusable webhook URL yields a notifier without a channel;
/// notification problems never stop the account check.
pub fn build_notifier(config: &RunConfig, credentials: &Credentials) -> Notifier {
    let webhook_env = &config.notify.webhook_env;
    let channel: Option<Box<dyn NotificationChannel>> = match credentials.get(webhook_env) {
        Some(url) => match WebhookChannel::new(url, config.probe.request_timeout()) {
            Ok(channel) => Some(Box::new(channel)),
            Err(e) => {
                warn!(
                    webhook_env = %webhook_env,
                    error = %e,
                    "webhook URL unusable, alerts will not be sent"
                );
                None
            }
        },
        None => {
            debug!(webhook_env = %webhook_env, "no webhook configured");
            None
        }
    };
    Notifier::new(channel, config.notify.title.clone())
}

/// Build a reconciler over `source` with the configured retry policy and pool size.
pub fn build_reconciler(config: &RunConfig, source: Arc<dyn StatusSource>) -> Reconciler {
    let probe = StatusProbe::new(source, RetryPolicy::from(&config.probe));
    Reconciler::new(probe, config.probe.worker_count())
}

/// Reconcile `roster` once and dispatch an alert if warranted.
pub async fn run_once(
    roster: &Roster,
    config: &RunConfig,
    source: Arc<dyn StatusSource>,
    notifier: &Notifier,
) -> RunReport {
    let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
    async {
        let reconciliation = build_reconciler(config, source).run(roster).await;
        log_summary(&reconciliation);
        let notification = notifier
            .notify(&reconciliation.suspended, &config.message_types)
            .await;
        RunReport {
            reconciliation,
            notification,
        }
    }
    .instrument(span)
    .await
}

fn log_summary(reconciliation: &Reconciliation) {
    let summary = reconciliation.summary();
    info!(
        active = summary.active,
        suspended = summary.suspended,
        errored = summary.errored,
        "reconciliation complete"
    );
    let errored = reconciliation.errored_usernames();
    if !errored.is_empty() {
        warn!(
            usernames = %errored.join(", "),
            "status unknown after retries; not reported as suspended"
        );
    }
    for group in reconciliation.suspended.groups() {
        for project in &group.projects {
            info!(
                group = %group.name,
                project = %project.name,
                usernames = %project.usernames.join(", "),
                "suspended accounts"
            );
        }
    }
}
