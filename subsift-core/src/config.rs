//! Engine and batch configuration with sensible defaults.
//!
//! [`EngineConfig`] controls how each key fans out to sources (timeouts,
//! inner concurrency, request pacing). [`BatchConfig`] controls how many keys
//! run at once and how large a batch may be. The defaults are tuned for
//! polite use of free public lookup services.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Slowest accepted request pacing: one request every 1000 seconds.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Configuration for per-key fan-out and source HTTP behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single source invocation, in seconds. Sources that
    /// exceed it contribute nothing for that key.
    pub source_timeout_secs: u64,
    /// How many sources are queried at once for a single key.
    pub source_concurrency: usize,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Request pacing per source. `0.0` disables rate limiting.
    pub requests_per_second: f64,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Maximum validated results kept from one source for one key.
    /// `0` disables the cap.
    pub max_results_per_source: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 300,
            source_concurrency: 6,
            request_timeout_secs: 10,
            requests_per_second: 1.0,
            user_agent: None,
            max_results_per_source: 50_000,
        }
    }
}

impl EngineConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `source_timeout_secs` must be greater than 0
    /// - `source_concurrency` must be greater than 0
    /// - `request_timeout_secs` must be greater than 0
    /// - `requests_per_second` must be `0` (unlimited) or at least
    ///   [`MIN_REQUESTS_PER_SECOND`]
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_timeout_secs == 0 {
            return Err(CoreError::Config(
                "source_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.source_concurrency == 0 {
            return Err(CoreError::Config(
                "source_concurrency must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        let rps = self.requests_per_second;
        if !rps.is_finite() || rps < 0.0 || (rps > 0.0 && rps < MIN_REQUESTS_PER_SECOND) {
            return Err(CoreError::Config(format!(
                "requests_per_second must be 0 or at least {MIN_REQUESTS_PER_SECOND}"
            )));
        }
        Ok(())
    }
}

/// Configuration for batch-level scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// How many keys are processed at once.
    pub key_concurrency: usize,
    /// Keys are dispatched in groups of this size; a group finishes before
    /// the next one starts.
    pub chunk_size: usize,
    /// Batches larger than this are rejected before any source is queried.
    pub max_keys: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            key_concurrency: 5,
            chunk_size: 1000,
            max_keys: 15_000,
        }
    }
}

impl BatchConfig {
    /// Validates this configuration, returning an error if any field is zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.key_concurrency == 0 {
            return Err(CoreError::Config(
                "key_concurrency must be greater than 0".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(CoreError::Config("chunk_size must be greater than 0".into()));
        }
        if self.max_keys == 0 {
            return Err(CoreError::Config("max_keys must be greater than 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_config_has_sensible_values() {
        let config = EngineConfig::default();
        assert_eq!(config.source_timeout_secs, 300);
        assert_eq!(config.source_concurrency, 6);
        assert_eq!(config.request_timeout_secs, 10);
        assert!((config.requests_per_second - 1.0).abs() < f64::EPSILON);
        assert!(config.user_agent.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_batch_config_has_sensible_values() {
        let config = BatchConfig::default();
        assert_eq!(config.key_concurrency, 5);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.max_keys, 15_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_source_timeout_rejected() {
        let config = EngineConfig {
            source_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source_timeout_secs"));
    }

    #[test]
    fn zero_source_concurrency_rejected() {
        let config = EngineConfig {
            source_concurrency: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("source_concurrency"));
    }

    #[test]
    fn negative_rate_rejected() {
        let config = EngineConfig {
            requests_per_second: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            requests_per_second: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn vanishing_rate_rejected() {
        for rate in [1e-30, f64::MIN_POSITIVE, 0.0005] {
            let config = EngineConfig {
                requests_per_second: rate,
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("requests_per_second"), "{rate}");
        }

        let config = EngineConfig {
            requests_per_second: MIN_REQUESTS_PER_SECOND,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rate_disables_limiting_and_is_valid() {
        let config = EngineConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"requests_per_second": 2.5}"#).expect("parse");
        assert!((config.requests_per_second - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.source_concurrency, 6);
    }

    #[test]
    fn zero_batch_fields_rejected() {
        for config in [
            BatchConfig {
                key_concurrency: 0,
                ..Default::default()
            },
            BatchConfig {
                chunk_size: 0,
                ..Default::default()
            },
            BatchConfig {
                max_keys: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err());
        }
    }
}
