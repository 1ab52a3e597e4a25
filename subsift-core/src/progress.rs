//! Batch progress events.
//!
//! Provides callback-based progress reporting that decouples the fan-out
//! and batch logic from presentation (CLI indicatif bars vs service logs).

use std::sync::Arc;

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// The batch passed validation and is about to dispatch keys.
    BatchStarted {
        /// Number of keys in the batch.
        total: usize,
    },
    /// Fan-out for a key has started.
    KeyStarted {
        /// The input key.
        key: String,
    },
    /// A key failed format validation and was not queried.
    KeySkipped {
        /// The rejected input key.
        key: String,
    },
    /// One source failed, timed out, or panicked for a key.
    SourceFailed {
        /// Source name.
        source: String,
        /// The input key.
        key: String,
        /// Human-readable failure description.
        reason: String,
    },
    /// Fan-out for a key has finished.
    KeyCompleted {
        /// The input key.
        key: String,
        /// Number of distinct validated results.
        found: usize,
    },
    /// Processing or persisting a key failed. The batch continues.
    KeyFailed {
        /// The input key.
        key: String,
        /// Human-readable error description.
        error: String,
    },
    /// Global progress after a key was counted as processed.
    Progress {
        /// Keys processed so far.
        completed: usize,
        /// Keys in the batch.
        total: usize,
    },
    /// The batch finished and the sink was flushed.
    BatchFinished {
        /// Distinct results across all keys.
        total_results: usize,
        /// Where the sink wrote them.
        destination: String,
    },
}

/// Callback type for receiving batch events.
///
/// The CLI drives indicatif bars from it; the status service leaves it
/// unset and relies on the job tracker instead. Shared because both the
/// aggregator and the runner emit through the same callback.
pub type ProgressCallback = Arc<dyn Fn(BatchEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn callback_receives_events() {
        let events: Arc<Mutex<Vec<BatchEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let callback: ProgressCallback = Arc::new(move |event| {
            let Ok(mut guard) = sink.lock() else {
                return;
            };
            guard.push(event);
        });

        callback(BatchEvent::KeyStarted {
            key: "example.com".into(),
        });
        callback(BatchEvent::Progress {
            completed: 1,
            total: 2,
        });

        let guard = events.lock().expect("lock");
        assert_eq!(guard.len(), 2);
        assert_eq!(
            guard[1],
            BatchEvent::Progress {
                completed: 1,
                total: 2
            }
        );
    }

    #[test]
    fn callback_is_cloneable_across_threads() {
        let callback: ProgressCallback = Arc::new(|_event| {});
        let clone = Arc::clone(&callback);
        std::thread::spawn(move || {
            clone(BatchEvent::BatchStarted { total: 1 });
        })
        .join()
        .expect("thread");
        callback(BatchEvent::BatchStarted { total: 1 });
    }
}
