//! Error types for the subsift application.

use subsift_core::CoreError;

/// Top-level error type for configuration, input, persistence, and the
/// status service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file or submission could not be turned into keys.
    #[error("input error: {0}")]
    Input(String),

    /// Result sink setup or write error.
    #[error("sink error: {0}")]
    Sink(String),

    /// Job store error (persistence, unknown job).
    #[error("job error: {0}")]
    Job(String),

    /// Status service error (bind, serve).
    #[error("server error: {0}")]
    Server(String),

    /// Error from the lookup engine.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<AppError> for CoreError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Core(inner) => inner,
            AppError::Io(inner) => CoreError::Io(inner),
            other => CoreError::Sink(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn display_input() {
        let err = AppError::Input("line 3: not a CIDR".into());
        assert_eq!(err.to_string(), "input error: line 3: not a CIDR");
    }

    #[test]
    fn core_errors_pass_through() {
        let err: AppError = CoreError::InvalidBatch("no keys provided".into()).into();
        assert_eq!(err.to_string(), "invalid batch: no keys provided");
    }

    #[test]
    fn app_errors_convert_to_sink_errors() {
        let err: CoreError = AppError::Sink("database is locked".into()).into();
        assert!(matches!(err, CoreError::Sink(_)));
        assert!(err.to_string().contains("database is locked"));
    }
}
