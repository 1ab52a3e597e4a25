//! AlienVault OTX passive DNS.
//!
//! Returns a JSON object whose `passive_dns` array holds records with a
//! `hostname` field.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::trim_base;

const DEFAULT_BASE_URL: &str = "https://otx.alienvault.com";

/// AlienVault OTX passive DNS source.
pub struct AlienVaultSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl AlienVaultSource {
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
impl Source for AlienVaultSource {
    fn name(&self) -> &str {
        SourceId::AlienVault.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!(
            "{}/api/v1/indicators/domain/{key}/passive_dns",
            self.base_url
        );
        match self.fetcher.get_json(&url).await? {
            Some(body) => parse_passive_dns(&body),
            None => Ok(BTreeSet::new()),
        }
    }
}

fn parse_passive_dns(body: &serde_json::Value) -> Result<BTreeSet<String>, CoreError> {
    let records = body
        .get("passive_dns")
        .and_then(|v| v.as_array())
        .ok_or_else(|| CoreError::Parse("AlienVault: missing passive_dns array".into()))?;

    Ok(records
        .iter()
        .filter_map(|r| r.get("hostname").and_then(|h| h.as_str()))
        .map(String::from)
        .collect())
}
