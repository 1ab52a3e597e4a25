//! Batch runner: many keys through the fan-out aggregator.
//!
//! Keys are dispatched in fixed-size chunks with a bounded number in
//! flight. Each finished key is appended to the sink immediately, so an
//! interrupted batch keeps everything persisted so far. Key-level failures
//! (sink errors, panics) are logged and absorbed; only batch-level errors
//! reach the caller.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use futures::FutureExt;

use crate::config::BatchConfig;
use crate::error::{CoreError, Result};
use crate::fanout::FanoutAggregator;
use crate::progress::BatchEvent;
use crate::sink::{JobTracker, Sink};

/// Shared state of one [`BatchRunner::run`] invocation.
///
/// The completed counter and the job tracker update happen under the same
/// lock, so a status reader never sees progress that disagrees with the
/// counter.
struct BatchProgress<'a> {
    completed: Mutex<usize>,
    total: usize,
    job: Option<&'a dyn JobTracker>,
    merged: Mutex<BTreeSet<String>>,
}

impl<'a> BatchProgress<'a> {
    fn new(total: usize, job: Option<&'a dyn JobTracker>) -> Self {
        Self {
            completed: Mutex::new(0),
            total,
            job,
            merged: Mutex::new(BTreeSet::new()),
        }
    }

    /// Count one more key as processed and return the new count.
    fn advance(&self) -> usize {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        *completed += 1;
        if let Some(job) = self.job {
            job.set_progress(*completed, self.total);
        }
        *completed
    }

    fn merge(&self, found: &BTreeSet<String>) {
        self.merged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(found.iter().cloned());
    }

    fn into_results(self) -> BTreeSet<String> {
        self.merged.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs batches of keys through a [`FanoutAggregator`].
pub struct BatchRunner {
    aggregator: FanoutAggregator,
    config: BatchConfig,
}

impl BatchRunner {
    /// Create a runner. Events are emitted through the aggregator's callback.
    pub fn new(aggregator: FanoutAggregator, config: BatchConfig) -> Self {
        Self { aggregator, config }
    }

    /// The aggregator every key is dispatched to.
    pub fn aggregator(&self) -> &FanoutAggregator {
        &self.aggregator
    }

    /// Check a batch against the size limits without running it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBatch`] if `count` is zero or above
    /// `max_keys`.
    pub fn check_size(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(CoreError::InvalidBatch("no keys provided".into()));
        }
        if count > self.config.max_keys {
            return Err(CoreError::InvalidBatch(format!(
                "{count} keys exceeds the limit of {}",
                self.config.max_keys
            )));
        }
        Ok(())
    }

    /// Process every key, persisting each key's results as it completes.
    ///
    /// Size limits are checked before any source is queried. When `job` is
    /// given it moves to running on dispatch, receives every progress
    /// update, and ends completed or failed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Config`] if the batch configuration is invalid
    /// - [`CoreError::InvalidBatch`] for an empty or oversized batch
    /// - Any error from [`Sink::finish`]
    /// - [`CoreError::Sink`] if the batch itself panics
    ///
    /// Per-source and per-key failures are never returned.
    pub async fn run(
        &self,
        keys: &[String],
        sink: &dyn Sink,
        job: Option<&dyn JobTracker>,
    ) -> Result<BTreeSet<String>> {
        let outcome = AssertUnwindSafe(self.run_inner(keys, sink, job))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!("batch panicked");
                Err(CoreError::Sink("batch panicked before completion".into()))
            });
        if let Some(job) = job {
            match &outcome {
                Ok(_) => job.mark_completed(),
                Err(e) => job.mark_failed(&e.to_string()),
            }
        }
        outcome
    }

    async fn run_inner(
        &self,
        keys: &[String],
        sink: &dyn Sink,
        job: Option<&dyn JobTracker>,
    ) -> Result<BTreeSet<String>> {
        self.config.validate()?;
        self.check_size(keys.len())?;

        let total = keys.len();
        tracing::info!(
            total,
            mode = %self.aggregator.mode(),
            sources = self.aggregator.sources().len(),
            destination = %sink.destination(),
            "batch started"
        );
        if let Some(job) = job {
            job.mark_running(total);
        }
        self.emit(BatchEvent::BatchStarted { total });

        let progress = BatchProgress::new(total, job);
        for chunk in keys.chunks(self.config.chunk_size) {
            stream::iter(chunk.iter().cloned())
                .for_each_concurrent(self.config.key_concurrency, |key: String| {
                    let progress = &progress;
                    async move { self.process_key(key, sink, progress).await }
                })
                .await;
        }

        sink.finish().await?;

        let results = progress.into_results();
        let destination = sink.destination();
        tracing::info!(
            total_results = results.len(),
            %destination,
            "batch finished"
        );
        self.emit(BatchEvent::BatchFinished {
            total_results: results.len(),
            destination,
        });
        Ok(results)
    }

    async fn process_key(&self, raw: String, sink: &dyn Sink, progress: &BatchProgress<'_>) {
        // Sinks see the same key the aggregator queried.
        let key = raw.trim().to_ascii_lowercase();
        if let Err(error) = self.fetch_and_persist(&key, sink, progress).await {
            tracing::warn!(%key, %error, "key failed");
            self.emit(BatchEvent::KeyFailed { key, error });
        }

        let completed = progress.advance();
        self.emit(BatchEvent::Progress {
            completed,
            total: progress.total,
        });
    }

    /// Fan out, merge, then persist. Keys with nothing found are not
    /// persisted. Results gathered before a persistence failure still count
    /// toward the batch total.
    async fn fetch_and_persist(
        &self,
        key: &str,
        sink: &dyn Sink,
        progress: &BatchProgress<'_>,
    ) -> std::result::Result<(), String> {
        let found = AssertUnwindSafe(self.aggregator.process(key))
            .catch_unwind()
            .await
            .map_err(|_| "panicked during fan-out".to_string())?;

        if found.is_empty() {
            return Ok(());
        }
        progress.merge(&found);

        match AssertUnwindSafe(sink.append(key, &found)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("panicked while persisting results".to_string()),
        }
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(callback) = self.aggregator.callback() {
            callback(event);
        }
    }
}
