//! Anubis subdomain database hosted at jldc.me.
//!
//! Returns a bare JSON array of subdomain strings.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::trim_base;

const DEFAULT_BASE_URL: &str = "https://jldc.me";

/// Anubis subdomain source.
pub struct AnubisSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl AnubisSource {
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
impl Source for AnubisSource {
    fn name(&self) -> &str {
        SourceId::Anubis.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/anubis/subdomains/{key}", self.base_url);
        let Some(body) = self.fetcher.get_json(&url).await? else {
            return Ok(BTreeSet::new());
        };
        let items = body
            .as_array()
            .ok_or_else(|| CoreError::Parse("Anubis: expected JSON array".into()))?;
        Ok(items
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> AnubisSource {
        let config = EngineConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        AnubisSource::new(&config)
            .expect("build")
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn skips_non_string_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anubis/subdomains/example.com"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(["a.example.com", 42, null, "b.example.com"])),
            )
            .mount(&server)
            .await;

        let found = source_for(&server).fetch("example.com").await.expect("fetch");
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn object_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "x"})))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch("example.com").await.unwrap_err();
        assert!(matches!(err, CoreError::Parse(_)));
    }
}
