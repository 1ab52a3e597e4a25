//! Per-key fan-out across every configured source.
//!
//! Queries all sources concurrently with a bounded width, absorbs every
//! source failure (error, panic, timeout) into an empty contribution,
//! filters each contribution through the mode's validator, and returns the
//! deduplicated union.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use futures::FutureExt;

use crate::config::EngineConfig;
use crate::progress::{BatchEvent, ProgressCallback};
use crate::source::SharedSource;
use crate::types::LookupMode;

/// Outcome of one source invocation after failure absorption.
enum SourceOutcome {
    Found(BTreeSet<String>),
    Failed(String),
}

/// Fans one key out to every source and merges the validated results.
pub struct FanoutAggregator {
    sources: Vec<SharedSource>,
    mode: LookupMode,
    config: EngineConfig,
    callback: Option<ProgressCallback>,
}

impl FanoutAggregator {
    /// Create an aggregator over `sources` for keys of the given `mode`.
    pub fn new(sources: Vec<SharedSource>, mode: LookupMode, config: EngineConfig) -> Self {
        Self {
            sources,
            mode,
            config,
            callback: None,
        }
    }

    /// Attach an event callback.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// The lookup mode keys are validated against.
    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    /// The sources queried for every key.
    pub fn sources(&self) -> &[SharedSource] {
        &self.sources
    }

    pub(crate) fn callback(&self) -> Option<&ProgressCallback> {
        self.callback.as_ref()
    }

    /// Query every source for `key` and return the merged, validated results.
    ///
    /// # Pipeline
    ///
    /// 1. Normalize and validate the key; an invalid key yields an empty set
    ///    and a [`BatchEvent::KeySkipped`] event without querying anything
    /// 2. Dispatch one future per source, at most `source_concurrency` in
    ///    flight, each bounded by `source_timeout_secs`
    /// 3. Convert errors, panics, and timeouts into empty contributions
    /// 4. Filter each contribution through the mode's validator and apply
    ///    the per-source result cap
    /// 5. Union the contributions
    ///
    /// Each source is queried exactly once; nothing is retried.
    pub async fn process(&self, key: &str) -> BTreeSet<String> {
        let key = key.trim().to_ascii_lowercase();
        if !self.mode.accepts_key(&key) {
            tracing::debug!(%key, mode = %self.mode, "skipping invalid key");
            self.emit(BatchEvent::KeySkipped { key });
            return BTreeSet::new();
        }

        self.emit(BatchEvent::KeyStarted { key: key.clone() });
        tracing::debug!(%key, sources = self.sources.len(), "fanning out");

        let timeout = Duration::from_secs(self.config.source_timeout_secs);
        // Owned inputs keep the future `Send` for callers that spawn batches.
        let queries: Vec<_> = self
            .sources
            .iter()
            .cloned()
            .map(|source: SharedSource| {
                let key = key.clone();
                async move {
                    let name = source.name().to_string();
                    let outcome = query_source(&source, &key, timeout).await;
                    (name, outcome)
                }
            })
            .collect();
        let outcomes: Vec<(String, SourceOutcome)> = stream::iter(queries)
            .buffer_unordered(self.config.source_concurrency.max(1))
            .collect()
            .await;

        let mut merged = BTreeSet::new();
        for (source, outcome) in outcomes {
            match outcome {
                SourceOutcome::Found(raw) => {
                    let raw_count = raw.len();
                    let filtered = self.cap(&source, &key, self.mode.filter_results(raw, &key));
                    tracing::debug!(
                        %key,
                        %source,
                        raw = raw_count,
                        kept = filtered.len(),
                        "source returned results"
                    );
                    merged.extend(filtered);
                }
                SourceOutcome::Failed(reason) => {
                    tracing::warn!(%key, %source, error = %reason, "source query failed");
                    self.emit(BatchEvent::SourceFailed {
                        source,
                        key: key.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::debug!(%key, found = merged.len(), "fan-out complete");
        self.emit(BatchEvent::KeyCompleted {
            key,
            found: merged.len(),
        });
        merged
    }

    fn cap(&self, source: &str, key: &str, results: BTreeSet<String>) -> BTreeSet<String> {
        let limit = self.config.max_results_per_source;
        if limit == 0 || results.len() <= limit {
            return results;
        }
        tracing::warn!(
            %key,
            %source,
            returned = results.len(),
            limit,
            "source exceeded result cap, truncating"
        );
        results.into_iter().take(limit).collect()
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

async fn query_source(source: &SharedSource, key: &str, timeout: Duration) -> SourceOutcome {
    let call = tokio::time::timeout(timeout, source.fetch(key));
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(Ok(found))) => SourceOutcome::Found(found),
        Ok(Ok(Err(e))) => SourceOutcome::Failed(e.to_string()),
        Ok(Err(_elapsed)) => {
            SourceOutcome::Failed(format!("timed out after {}s", timeout.as_secs()))
        }
        Err(_panic) => SourceOutcome::Failed("source panicked".to_string()),
    }
}
