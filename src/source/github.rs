//! GitHub REST API status source.
//!
//! `GET /users/{username}` answers whether an account exists and
//! `GET /rate_limit` reports the global quota. A token, when configured,
//! raises the quota from 60 to 5000 requests per hour.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{RateLimitState, SourceError, StatusSource, UserLookup};

/// Current package version, set at compile time.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Status source backed by the GitHub REST API.
pub struct GitHubSource {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSource")
            .field("api_base", &self.api_base)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: RateLimitState,
}

impl GitHubSource {
    /// Create a source for the API rooted at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("ghwatch/{VERSION}"))
            .timeout(timeout)
            .build()
            .context("failed to build GitHub HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            token,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.api_base);
        let request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl StatusSource for GitHubSource {
    async fn lookup_user(&self, username: &str) -> Result<UserLookup, SourceError> {
        let response = self.get(&format!("/users/{username}")).send().await?;
        let status = response.status().as_u16();
        debug!(username, status, "user lookup");
        Ok(UserLookup::from_status(status))
    }

    async fn rate_limit(&self) -> Result<RateLimitState, SourceError> {
        let response = self.get("/rate_limit").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus(status.as_u16()));
        }
        let body = response.text().await?;
        let parsed: RateLimitResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(parsed.rate)
    }
}
