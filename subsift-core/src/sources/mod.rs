//! Lookup source implementations and the explicit source registry.
//!
//! Each module provides a struct implementing [`crate::source::Source`]
//! for one third-party service. Every struct accepts a base URL override
//! so its request and parsing path can be exercised against a mock server.

pub mod alienvault;
pub mod anubis;
pub mod crtsh;
pub mod hackertarget;
pub mod rapiddns;
pub mod urlscan;
pub mod webscan;

use std::sync::Arc;

use scraper::{Html, Selector};

pub use alienvault::AlienVaultSource;
pub use anubis::AnubisSource;
pub use crtsh::CrtShSource;
pub use hackertarget::{HackerTargetReverseIpSource, HackerTargetSource};
pub use rapiddns::{RapidDnsSameIpSource, RapidDnsSource};
pub use urlscan::UrlScanSource;
pub use webscan::WebScanSource;

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::source::SharedSource;
use crate::types::{LookupMode, SourceId};

/// Construct the concrete source for `id`.
///
/// # Errors
///
/// Returns [`CoreError::Http`] if the source's HTTP client cannot be built.
pub fn build_source(id: SourceId, config: &EngineConfig) -> Result<SharedSource, CoreError> {
    let source: SharedSource = match id {
        SourceId::CrtSh => Arc::new(CrtShSource::new(config)?),
        SourceId::HackerTarget => Arc::new(HackerTargetSource::new(config)?),
        SourceId::AlienVault => Arc::new(AlienVaultSource::new(config)?),
        SourceId::Anubis => Arc::new(AnubisSource::new(config)?),
        SourceId::UrlScan => Arc::new(UrlScanSource::new(config)?),
        SourceId::RapidDns => Arc::new(RapidDnsSource::new(config)?),
        SourceId::HackerTargetReverseIp => Arc::new(HackerTargetReverseIpSource::new(config)?),
        SourceId::RapidDnsSameIp => Arc::new(RapidDnsSameIpSource::new(config)?),
        SourceId::WebScan => Arc::new(WebScanSource::new(config)?),
    };
    Ok(source)
}

/// All registered sources for `mode`, in registry order.
///
/// # Errors
///
/// Returns [`CoreError::Http`] if any source's HTTP client cannot be built.
pub fn sources_for(mode: LookupMode, config: &EngineConfig) -> Result<Vec<SharedSource>, CoreError> {
    SourceId::for_mode(mode)
        .into_iter()
        .map(|id| build_source(id, config))
        .collect()
}

/// The subdomain enumeration sources.
///
/// # Errors
///
/// Same as [`sources_for`].
pub fn subdomain_sources(config: &EngineConfig) -> Result<Vec<SharedSource>, CoreError> {
    sources_for(LookupMode::Subdomain, config)
}

/// The reverse-IP lookup sources.
///
/// # Errors
///
/// Same as [`sources_for`].
pub fn reverse_ip_sources(config: &EngineConfig) -> Result<Vec<SharedSource>, CoreError> {
    sources_for(LookupMode::ReverseIp, config)
}

/// Collect the trimmed text of every `<td>` cell in an HTML document.
///
/// Shared by the table-scraping sources; the validator later discards
/// cells that are not hostnames (row numbers, IPs, record types).
pub(crate) fn table_cells(html: &str) -> Result<Vec<String>, CoreError> {
    let document = Html::parse_document(html);
    let cell_sel = Selector::parse("table td")
        .map_err(|e| CoreError::Parse(format!("invalid cell selector: {e:?}")))?;

    Ok(document
        .select(&cell_sel)
        .map(|td| td.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect())
}

/// Trim a configured base URL so endpoint paths can be appended with `/`.
pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
