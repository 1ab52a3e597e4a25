//! crt.sh: certificate transparency log search.
//!
//! Queries `https://crt.sh/?q=%25.{domain}&output=json`, which returns a
//! JSON array of certificate entries. Each entry's `name_value` may hold
//! several newline-separated names; `common_name` is collected too.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::trim_base;

const DEFAULT_BASE_URL: &str = "https://crt.sh";

/// crt.sh certificate transparency source.
pub struct CrtShSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl CrtShSource {
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
impl Source for CrtShSource {
    fn name(&self) -> &str {
        SourceId::CrtSh.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        tracing::trace!(key, "crt.sh lookup");
        let url = format!("{}/?q=%25.{key}&output=json", self.base_url);
        match self.fetcher.get_json(&url).await? {
            Some(body) => parse_crtsh_json(&body),
            None => Ok(BTreeSet::new()),
        }
    }
}

/// Extract names from a crt.sh JSON response.
pub(crate) fn parse_crtsh_json(body: &serde_json::Value) -> Result<BTreeSet<String>, CoreError> {
    let entries = body
        .as_array()
        .ok_or_else(|| CoreError::Parse("crt.sh: expected JSON array".into()))?;

    let mut names = BTreeSet::new();
    for entry in entries {
        for field in ["name_value", "common_name"] {
            if let Some(value) = entry.get(field).and_then(|v| v.as_str()) {
                names.extend(
                    value
                        .split('\n')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(String::from),
                );
            }
        }
    }
    Ok(names)
}
