//! Trait definition for pluggable lookup sources.
//!
//! Each lookup service (crt.sh, HackerTarget, AlienVault, ...) implements
//! [`Source`] to provide a uniform single-method interface. Sources are
//! registered explicitly in [`crate::sources`]; there is no runtime plugin
//! discovery.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreError;

/// A pluggable lookup service.
///
/// Implementors query one third-party service for one key and return the
/// raw candidate strings they extracted. Each source handles its own:
///
/// - URL construction from a fixed endpoint template
/// - HTTP request with rotating browser headers
/// - Response parsing (JSON, delimited text, or HTML table cells)
///
/// A non-200 response is an empty result, not an error. Transport and
/// parse errors are returned as [`CoreError`]; the fan-out aggregator turns
/// them into an empty contribution and a log line, so callers never need to
/// special-case a particular source.
///
/// Candidates are *not* expected to be validated here. Filtering against
/// the key happens in [`crate::validate`].
///
/// All implementations must be `Send + Sync` for concurrent queries.
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable source name used in logs and events.
    fn name(&self) -> &str;

    /// Query the service for `key` and return raw candidate strings.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the request fails or the body cannot be parsed.
    async fn fetch(&self, key: &str) -> Result<BTreeSet<String>, CoreError>;
}

/// A source shared between concurrently running keys.
pub type SharedSource = Arc<dyn Source>;
