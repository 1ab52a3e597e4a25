//! urlscan.io search API.
//!
//! The search endpoint returns `{"results": [{"page": {"domain": ...},
//! "task": {"domain": ...}}]}`; both domains are collected.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::trim_base;

const DEFAULT_BASE_URL: &str = "https://urlscan.io";

/// urlscan.io search source.
pub struct UrlScanSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl UrlScanSource {
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
impl Source for UrlScanSource {
    fn name(&self) -> &str {
        SourceId::UrlScan.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/api/v1/search/?q=domain:{key}", self.base_url);
        match self.fetcher.get_json(&url).await? {
            Some(body) => parse_search_results(&body),
            None => Ok(BTreeSet::new()),
        }
    }
}

fn parse_search_results(body: &serde_json::Value) -> Result<BTreeSet<String>, CoreError> {
    let results = body
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| CoreError::Parse("urlscan: missing results array".into()))?;

    let mut domains = BTreeSet::new();
    for result in results {
        for section in ["page", "task"] {
            if let Some(domain) = result
                .get(section)
                .and_then(|s| s.get("domain"))
                .and_then(|d| d.as_str())
            {
                domains.insert(domain.to_string());
            }
        }
    }
    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn collects_page_and_task_domains() {
        let body = json!({
            "results": [
                {"page": {"domain": "a.example.com"}, "task": {"domain": "b.example.com"}},
                {"page": {"domain": "a.example.com"}},
                {"task": {}}
            ],
            "total": 3
        });
        let found = parse_search_results(&body).expect("parse");
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn fetch_sends_domain_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search/"))
            .and(query_param("q", "domain:example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"page": {"domain": "cdn.example.com"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = EngineConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        let source = UrlScanSource::new(&config)
            .expect("build")
            .with_base_url(server.uri());
        let found = source.fetch("example.com").await.expect("fetch");
        assert!(found.contains("cdn.example.com"));
    }
}
