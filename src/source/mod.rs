//! Account status source abstraction.
//!
//! Defines the [`StatusSource`] trait the probe talks to, plus the shared
//! response and error types. [`github::GitHubSource`] is the production
//! implementation backed by the GitHub REST API.

use async_trait::async_trait;
use serde::Deserialize;

pub mod github;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Outcome of a single user lookup, classified by HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup {
    /// 2xx: the account exists.
    Found,
    /// 404: no such account, treated as suspended.
    NotFound,
    /// 403: rate limited or access denied.
    Forbidden,
    /// 5xx.
    ServerError(u16),
    /// Any other non-success status.
    Unexpected(u16),
}

impl UserLookup {
    /// Classify a raw HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Found,
            404 => Self::NotFound,
            403 => Self::Forbidden,
            500..=599 => Self::ServerError(status),
            other => Self::Unexpected(other),
        }
    }
}

/// Snapshot of the global API quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitState {
    /// Requests left in the current window.
    pub remaining: u64,
    /// Window reset time, epoch seconds.
    pub reset: i64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by status sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP transport failure (timeout, DNS, connection reset).
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Transport failure reported by a non-HTTP source.
    #[error("status source unreachable: {0}")]
    Unreachable(String),
    /// Endpoint responded with a non-success status.
    #[error("status source returned {0}")]
    HttpStatus(u16),
    /// Response body did not match the expected schema.
    #[error("status response parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Where account status comes from.
///
/// Implementations must be `Send + Sync` so one source can be shared by
/// every concurrent probe.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Look up a single account.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only when no HTTP status was obtained.
    async fn lookup_user(&self, username: &str) -> Result<UserLookup, SourceError>;

    /// Query the current global rate-limit state.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or parse failure.
    async fn rate_limit(&self) -> Result<RateLimitState, SourceError>;
}
