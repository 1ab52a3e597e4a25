//! Shared HTTP fetcher with User-Agent rotation and request pacing.
//!
//! Every concrete source owns one [`HttpFetcher`]. It wraps a configured
//! [`reqwest::Client`], attaches browser-like headers with a rotating
//! User-Agent on every request, and waits on the source's
//! [`RateLimiter`] before sending.

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::rate_limit::RateLimiter;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use std::time::Duration;

/// Realistic browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Build a [`reqwest::Client`] configured for lookup service requests.
///
/// The client has:
/// - Cookie store enabled
/// - Per-request timeout from config
/// - Up to 10 redirects followed
/// - Brotli and gzip decompression
///
/// # Errors
///
/// Returns [`CoreError::Http`] if the client cannot be constructed.
pub fn build_client(config: &EngineConfig) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| CoreError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // SAFETY: USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

/// Rate-limited HTTP GET helper shared by the concrete sources.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: Option<RateLimiter>,
    user_agent: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher with its own client and a limiter built from
    /// `config.requests_per_second`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] if the client cannot be constructed.
    pub fn new(config: &EngineConfig) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_client(config)?,
            limiter: RateLimiter::per_second(config.requests_per_second),
            user_agent: config.user_agent.clone(),
        })
    }

    /// GET `url` and return the body, or `None` if the status is not 200.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] on transport failure or if the body
    /// cannot be read.
    pub async fn get_text(&self, url: &str) -> Result<Option<String>, CoreError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let ua = match self.user_agent {
            Some(ref custom) => custom.as_str(),
            None => random_user_agent(),
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, ua)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| CoreError::Http(format!("request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(%status, url, "non-200 response ignored");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Http(format!("response read failed: {e}")))?;

        tracing::trace!(bytes = body.len(), url, "response received");
        Ok(Some(body))
    }

    /// GET `url` and parse the body as JSON, or `None` if the status is not 200.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] on transport failure and
    /// [`CoreError::Parse`] if the body is not valid JSON.
    pub async fn get_json(&self, url: &str) -> Result<Option<serde_json::Value>, CoreError> {
        let Some(body) = self.get_text(url).await? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| CoreError::Parse(format!("invalid JSON body: {e}")))
    }
}
