//! HackerTarget: host search and reverse IP lookup.
//!
//! Both endpoints return plain text. Host search yields `host,ip` lines;
//! reverse IP lookup yields one hostname per line. Quota and error
//! messages come back as 200 text too, and are left for the validator to
//! discard.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::trim_base;

const DEFAULT_BASE_URL: &str = "https://api.hackertarget.com";

/// HackerTarget `hostsearch` subdomain source.
pub struct HackerTargetSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl HackerTargetSource {
    /// Create the source against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, CoreError> {
        Ok(Self {
            fetcher: HttpFetcher::new(config)?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the endpoint base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base(&base_url.into());
        self
    }
}

#[async_trait]
impl Source for HackerTargetSource {
    fn name(&self) -> &str {
        SourceId::HackerTarget.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/hostsearch/?q={key}", self.base_url);
        Ok(self
            .fetcher
            .get_text(&url)
            .await?
            .map(|body| parse_hostsearch(&body))
            .unwrap_or_default())
    }
}

/// HackerTarget `reverseiplookup` source.
pub struct HackerTargetReverseIpSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl HackerTargetReverseIpSource {
    /// Create the source against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, CoreError> {
        Ok(Self {
            fetcher: HttpFetcher::new(config)?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the endpoint base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = trim_base(&base_url.into());
        self
    }
}

#[async_trait]
impl Source for HackerTargetReverseIpSource {
    fn name(&self) -> &str {
        SourceId::HackerTargetReverseIp.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/reverseiplookup/?q={key}", self.base_url);
        Ok(self
            .fetcher
            .get_text(&url)
            .await?
            .map(|body| parse_lines(&body))
            .unwrap_or_default())
    }
}

/// First column of each `host,ip` line.
fn parse_hostsearch(body: &str) -> BTreeSet<String> {
    body.lines()
        .filter_map(|line| line.split_once(','))
        .map(|(host, _)| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect()
}

fn parse_lines(body: &str) -> BTreeSet<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
