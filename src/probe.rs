//! Per-account status probing with bounded retry and rate-limit waits.
//!
//! A probe settles on the first definitive answer (`Active` on 2xx,
//! `Suspended` on 404). Everything else is retried with a fixed pause; a
//! 403 first waits for API capacity. Exhausted retries yield `Error`, never
//! a propagated failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::source::{StatusSource, UserLookup};

/// Classified account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// The account exists.
    Active,
    /// The account is gone (404).
    Suspended,
    /// No definitive answer after all attempts.
    Error,
}

impl AccountStatus {
    /// Lowercase label for logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// The probed login.
    pub username: String,
    /// Final classification.
    pub status: AccountStatus,
    /// Lookups issued before settling or giving up.
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// What a single attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Definitive answer; stop retrying.
    Settled(T),
    /// Transient failure; try again if attempts remain.
    Retry,
}

/// Outcome of running an operation under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// The settled value, or `None` when attempts ran out.
    pub value: Option<T>,
    /// Attempts actually made.
    pub attempts: u32,
}

/// Fixed-delay bounded retry. No backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl From<&ProbeConfig> for RetryPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it settles or attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. The pause is applied only
    /// between attempts, never after the last one.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;
        loop {
            if let Attempt::Settled(value) = op(attempt).await {
                return RetryOutcome {
                    value: Some(value),
                    attempts: attempt,
                };
            }
            if attempt >= max_attempts {
                return RetryOutcome {
                    value: None,
                    attempts: attempt,
                };
            }
            debug!(
                attempt,
                delay_secs = self.delay.as_secs(),
                "retrying after delay"
            );
            tokio::time::sleep(self.delay).await;
            attempt = attempt.saturating_add(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

/// Waits for API capacity after a forbidden response.
///
/// Stateless: every call re-queries the source. The quota is global to the
/// token (or client IP), not scoped to a username.
pub struct RateLimiter {
    source: Arc<dyn StatusSource>,
    fallback: Duration,
}

impl RateLimiter {
    /// Create a limiter that sleeps `fallback` when the quota query fails.
    pub fn new(source: Arc<dyn StatusSource>, fallback: Duration) -> Self {
        Self { source, fallback }
    }

    /// Block until the quota window resets if it is exhausted.
    ///
    /// Returns how long the caller was paused.
    pub async fn wait_for_capacity(&self) -> Duration {
        let wait = match self.source.rate_limit().await {
            Ok(state) if state.remaining == 0 => {
                let wait = reset_wait(state.reset, chrono::Utc::now().timestamp());
                info!(
                    reset = state.reset,
                    sleep_secs = wait.as_secs(),
                    "rate limit exhausted, sleeping until reset"
                );
                wait
            }
            Ok(state) => {
                debug!(remaining = state.remaining, "rate limit has capacity");
                Duration::ZERO
            }
            Err(e) => {
                warn!(
                    error = %e,
                    sleep_secs = self.fallback.as_secs(),
                    "failed to check rate limit, sleeping fallback delay"
                );
                self.fallback
            }
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

/// Time left until `reset`, clamped at zero for windows already past.
pub fn reset_wait(reset: i64, now: i64) -> Duration {
    let secs = reset.saturating_sub(now);
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Checks one username against a [`StatusSource`].
pub struct StatusProbe {
    source: Arc<dyn StatusSource>,
    limiter: RateLimiter,
    policy: RetryPolicy,
}

impl StatusProbe {
    /// Create a probe. The rate-limit fallback reuses the retry delay.
    pub fn new(source: Arc<dyn StatusSource>, policy: RetryPolicy) -> Self {
        let limiter = RateLimiter::new(Arc::clone(&source), policy.delay);
        Self {
            source,
            limiter,
            policy,
        }
    }

    /// Classify `username`. Never fails; exhausted retries yield `Error`.
    pub async fn probe(&self, username: &str) -> ProbeResult {
        let outcome = self
            .policy
            .run(|attempt| self.attempt(username, attempt))
            .await;

        let status = outcome.value.unwrap_or(AccountStatus::Error);
        if status == AccountStatus::Error {
            warn!(
                username,
                attempts = outcome.attempts,
                "giving up on status check"
            );
        } else {
            debug!(username, %status, attempts = outcome.attempts, "status settled");
        }

        ProbeResult {
            username: username.to_owned(),
            status,
            attempts: outcome.attempts,
        }
    }

    async fn attempt(&self, username: &str, attempt: u32) -> Attempt<AccountStatus> {
        match self.source.lookup_user(username).await {
            Ok(UserLookup::Found) => Attempt::Settled(AccountStatus::Active),
            Ok(UserLookup::NotFound) => {
                info!(username, "account not found, treating as suspended");
                Attempt::Settled(AccountStatus::Suspended)
            }
            Ok(UserLookup::Forbidden) => {
                warn!(
                    username,
                    attempt, "forbidden: rate limit or access denied"
                );
                self.limiter.wait_for_capacity().await;
                Attempt::Retry
            }
            Ok(UserLookup::ServerError(status)) => {
                warn!(username, attempt, status, "server error while checking account");
                Attempt::Retry
            }
            Ok(UserLookup::Unexpected(status)) => {
                warn!(username, attempt, status, "unexpected HTTP status");
                Attempt::Retry
            }
            Err(e) => {
                warn!(username, attempt, error = %e, "status request failed");
                Attempt::Retry
            }
        }
    }
}
