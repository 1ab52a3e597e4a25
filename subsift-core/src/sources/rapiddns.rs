//! RapidDNS: subdomain and same-IP HTML tables.
//!
//! Both pages render results as an HTML table. Every cell is collected;
//! row numbers, IP addresses and record types are dropped later by the
//! validator.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::http::HttpFetcher;
use crate::source::Source;
use crate::types::SourceId;

use super::{table_cells, trim_base};

const DEFAULT_BASE_URL: &str = "https://rapiddns.io";

/// RapidDNS subdomain table source.
pub struct RapidDnsSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl RapidDnsSource {
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
impl Source for RapidDnsSource {
    fn name(&self) -> &str {
        SourceId::RapidDns.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/subdomain/{key}?full=1", self.base_url);
        match self.fetcher.get_text(&url).await? {
            Some(html) => Ok(table_cells(&html)?.into_iter().collect()),
            None => Ok(BTreeSet::new()),
        }
    }
}

/// RapidDNS same-IP table source.
pub struct RapidDnsSameIpSource {
    fetcher: HttpFetcher,
    base_url: String,
}

impl RapidDnsSameIpSource {
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
impl Source for RapidDnsSameIpSource {
    fn name(&self) -> &str {
        SourceId::RapidDnsSameIp.name()
    }

    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError> {
        let url = format!("{}/sameip/{key}?full=1", self.base_url);
        match self.fetcher.get_text(&url).await? {
            Some(html) => Ok(table_cells(&html)?.into_iter().collect()),
            None => Ok(BTreeSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MOCK_TABLE: &str = r#"<!DOCTYPE html>
<html><body>
<table id="table" class="table">
  <thead><tr><th>#</th><th>Domain</th><th>Address</th><th>Type</th></tr></thead>
  <tbody>
    <tr><th scope="row">1</th><td>www.example.com</td><td>93.184.216.34</td><td>A</td></tr>
    <tr><th scope="row">2</th><td>mail.example.com</td><td>93.184.216.35</td><td>A</td></tr>
  </tbody>
</table>
</body></html>"#;

    fn test_config() -> EngineConfig {
        EngineConfig {
            requests_per_second: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn subdomain_table_cells_collected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subdomain/example.com"))
            .and(query_param("full", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_TABLE))
            .expect(1)
            .mount(&server)
            .await;

        let source = RapidDnsSource::new(&test_config())
            .expect("build")
            .with_base_url(server.uri());
        let found = source.fetch("example.com").await.expect("fetch");
        assert!(found.contains("www.example.com"));
        assert!(found.contains("mail.example.com"));
        // Address and type cells are raw candidates; the validator drops them.
        assert!(found.contains("A"));
    }

    #[tokio::test]
    async fn same_ip_uses_sameip_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sameip/93.184.216.34"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MOCK_TABLE))
            .expect(1)
            .mount(&server)
            .await;

        let source = RapidDnsSameIpSource::new(&test_config())
            .expect("build")
            .with_base_url(server.uri());
        let found = source.fetch("93.184.216.34").await.expect("fetch");
        assert!(found.contains("www.example.com"));
    }

    #[tokio::test]
    async fn empty_page_yields_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let source = RapidDnsSource::new(&test_config())
            .expect("build")
            .with_base_url(server.uri());
        assert!(source.fetch("example.com").await.expect("fetch").is_empty());
    }
}
