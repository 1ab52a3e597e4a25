//! Error types for the subsift-core crate.
//!
//! All errors use stable string messages suitable for display to users
//! and for recording on a failed job. Source-level and key-level errors
//! never escape a batch; only batch-level variants reach callers of
//! [`crate::BatchRunner::run`].

/// Errors that can occur while querying sources or running a batch.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An HTTP request to a lookup service failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A lookup service returned a body that could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid engine or batch configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The submitted batch cannot be processed (empty or oversized).
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// A sink failed to persist results.
    #[error("sink error: {0}")]
    Sink(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for subsift-core results.
pub type Result<T> = std::result::Result<T, CoreError>;
