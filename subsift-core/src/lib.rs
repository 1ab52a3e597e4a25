//! # subsift-core
//!
//! Concurrent multi-source subdomain and reverse-IP aggregation.
//!
//! For every input key this crate queries a set of free public lookup
//! services concurrently, validates what they return against the key, and
//! merges the survivors into one deduplicated, sorted set. A batch runner
//! drives many keys at once and persists each key's results as soon as it
//! finishes.
//!
//! ## Design
//!
//! - Each lookup service is a [`Source`]: one async `fetch` method, one
//!   concrete type per service, registered explicitly in [`sources`]
//! - [`FanoutAggregator`] queries every source for one key with a bounded
//!   width and a per-source timeout; errors, panics, and timeouts become
//!   empty contributions
//! - [`BatchRunner`] processes keys in chunks with a bounded number in
//!   flight, appends to a [`Sink`] per key, and mirrors progress into an
//!   optional [`JobTracker`]
//! - Every source paces itself with a [`RateLimiter`] and rotates its
//!   User-Agent
//!
//! ## Failure model
//!
//! - Source failures are logged and absorbed inside the aggregator
//! - Key failures (sink errors, panics) are logged and absorbed inside the
//!   runner
//! - Only batch-level problems (empty or oversized input, invalid
//!   configuration, a sink that cannot finish) are returned as errors

pub mod batch;
pub mod config;
pub mod error;
pub mod fanout;
pub mod http;
pub mod progress;
pub mod rate_limit;
pub mod sink;
pub mod source;
pub mod sources;
pub mod types;
pub mod validate;

use std::collections::BTreeSet;

pub use batch::BatchRunner;
pub use config::{BatchConfig, EngineConfig, MIN_REQUESTS_PER_SECOND};
pub use error::{CoreError, Result};
pub use fanout::FanoutAggregator;
pub use progress::{BatchEvent, ProgressCallback};
pub use rate_limit::RateLimiter;
pub use sink::{JobTracker, NullSink, Sink};
pub use source::{SharedSource, Source};
pub use types::{LookupMode, SourceId};

/// Look up a single key against every registered source for `mode`.
///
/// Convenience wrapper that builds the registry, fans out once, and returns
/// the merged results. Source failures are logged, never returned.
///
/// # Errors
///
/// Returns [`CoreError::Config`] if `config` is invalid, or
/// [`CoreError::Http`] if a source's HTTP client cannot be built.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> subsift_core::Result<()> {
/// use subsift_core::{EngineConfig, LookupMode};
///
/// let found = subsift_core::lookup("example.com", LookupMode::Subdomain, &EngineConfig::default()).await?;
/// for name in &found {
///     println!("{name}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn lookup(key: &str, mode: LookupMode, config: &EngineConfig) -> Result<BTreeSet<String>> {
    config.validate()?;
    let sources = sources::sources_for(mode, config)?;
    Ok(FanoutAggregator::new(sources, mode, config.clone())
        .process(key)
        .await)
}

/// Build a [`BatchRunner`] over every registered source for `mode`.
///
/// # Errors
///
/// Returns [`CoreError::Config`] if either configuration is invalid, or
/// [`CoreError::Http`] if a source's HTTP client cannot be built.
pub fn runner_for(
    mode: LookupMode,
    engine: &EngineConfig,
    batch: BatchConfig,
    callback: Option<ProgressCallback>,
) -> Result<BatchRunner> {
    engine.validate()?;
    batch.validate()?;
    let sources = sources::sources_for(mode, engine)?;
    let mut aggregator = FanoutAggregator::new(sources, mode, engine.clone());
    if let Some(callback) = callback {
        aggregator = aggregator.with_callback(callback);
    }
    Ok(BatchRunner::new(aggregator, batch))
}
