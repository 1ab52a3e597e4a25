//! Collaborator traits the batch runner writes through.
//!
//! [`Sink`] receives each key's merged results as soon as the key
//! completes. [`JobTracker`] mirrors batch progress into an externally
//! visible job record. Concrete implementations live in the application
//! crate; this crate only defines the seams.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;

/// Durable destination for merged results.
///
/// `append` is called once per processed key, possibly from several keys
/// running concurrently, so implementations must serialize their own
/// writes. A failing `append` is logged by the runner and does not abort
/// the batch.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human-readable location of the output (file path, database path).
    fn destination(&self) -> String;

    /// Persist the merged results for one key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Sink`] or [`crate::CoreError::Io`] on
    /// write failure.
    async fn append(&self, key: &str, results: &BTreeSet<String>) -> Result<()>;

    /// Flush or compact once every key has been appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the final output cannot be written. The runner
    /// treats this as a batch-level failure.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Receives job lifecycle transitions from the batch runner.
///
/// Calls happen under the runner's progress lock, so a tracker never
/// observes progress out of order.
pub trait JobTracker: Send + Sync {
    /// The batch passed validation and dispatch is starting.
    fn mark_running(&self, total: usize);

    /// One more key was counted as processed.
    fn set_progress(&self, completed: usize, total: usize);

    /// The batch loop returned normally.
    fn mark_completed(&self);

    /// An error escaped the batch loop.
    fn mark_failed(&self, error: &str);
}

/// A sink that discards everything. Useful for dry runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl Sink for NullSink {
    fn destination(&self) -> String {
        "(discarded)".to_string()
    }

    async fn append(&self, _key: &str, _results: &BTreeSet<String>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_sink_accepts_everything() {
        let sink = NullSink;
        let results: BTreeSet<String> = ["a.example.com".to_string()].into();
        sink.append("example.com", &results).await.expect("append");
        sink.finish().await.expect("finish");
        assert_eq!(sink.destination(), "(discarded)");
    }

    #[test]
    fn traits_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Sink>();
        assert_send_sync::<dyn JobTracker>();
    }
}
