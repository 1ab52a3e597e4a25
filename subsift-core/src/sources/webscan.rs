//! WebScan reverse IP API.
//!
//! `https://api.webscan.cc/?action=query&ip={ip}` returns a JSON array of
//! `{"domain": ..., "title": ...}` objects, or `null` when nothing is known.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::trim_base;

const DEFAULT_BASE_URL: &str = "https://api.webscan.cc";

/// WebScan reverse IP source.
pub struct WebScanSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl WebScanSource {
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
impl Source for WebScanSource {
    fn name(&self) -> &str {
        SourceId::WebScan.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/?action=query&ip={key}", self.base_url);
        match self.fetcher.get_json(&url).await? {
            Some(body) => parse_webscan(&body),
            None => Ok(BTreeSet::new()),
        }
    }
}

fn parse_webscan(body: &serde_json::Value) -> Result<BTreeSet<String>, CoreError> {
    if body.is_null() {
        return Ok(BTreeSet::new());
    }
    let entries = body
        .as_array()
        .ok_or_else(|| CoreError::Parse("WebScan: expected JSON array".into()))?;
    Ok(entries
        .iter()
        .filter_map(|e| e.get("domain").and_then(|d| d.as_str()))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn null_body_is_empty() {
        assert!(parse_webscan(&serde_json::Value::Null).expect("parse").is_empty());
    }

    #[test]
    fn extracts_domain_fields() {
        let body = json!([
            {"domain": "example.com", "title": "Example"},
            {"domain": "example.org"},
            {"title": "no domain"}
        ]);
        assert_eq!(parse_webscan(&body).expect("parse").len(), 2);
    }

    #[tokio::test]
    async fn fetch_passes_ip_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "query"))
            .and(query_param("ip", "10.1.2.3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"domain": "host.example.com"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = EngineConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        let source = WebScanSource::new(&config)
            .expect("build")
            .with_base_url(server.uri());
        let found = source.fetch("10.1.2.3").await.expect("fetch");
        assert!(found.contains("host.example.com"));
    }
}
