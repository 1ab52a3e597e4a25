//! subsift: batch subdomain and reverse-IP discovery.
//!
//! The lookup engine lives in [`subsift_core`]. This crate adds everything
//! around it that touches the outside world:
//!
//! - **Configuration**: TOML with per-section defaults ([`config`])
//! - **Input**: newline-separated keys with CIDR expansion ([`input`])
//! - **Sinks**: sorted text files and SQLite ([`sink`])
//! - **Jobs**: durable job records for submitted batches ([`jobs`])
//! - **Status service**: axum HTTP API over the job store ([`server`])

pub mod config;
pub mod error;
pub mod input;
pub mod jobs;
pub mod server;
pub mod sink;

pub use config::{SubsiftConfig, WriteMode};
pub use error::{AppError, Result};
pub use input::{LoadedKeys, load_keys, parse_keys};
pub use jobs::{JobHandle, JobRecord, JobStatus, JobStore};
pub use server::{SourceRegistry, StatusServer, default_registry};
pub use sink::{FileSink, SqliteSink};
