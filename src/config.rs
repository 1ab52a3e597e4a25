//! Configuration types for the subsift application.
//!
//! Loaded from TOML. Every section is `#[serde(default)]`, so a config file
//! only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use subsift_core::{BatchConfig, EngineConfig};

use crate::error::{AppError, Result};

/// Default status service port.
pub const DEFAULT_PORT: u16 = 10_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsiftConfig {
    /// Per-key fan-out and source HTTP settings.
    pub engine: EngineConfig,
    /// Batch scheduling and size limits.
    pub batch: BatchConfig,
    /// Where and how results are written.
    pub output: OutputConfig,
    /// Status service settings.
    pub server: ServerConfig,
}

/// How a file sink treats existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Merge into whatever the file already holds.
    #[default]
    Append,
    /// Replace the file with this run's results.
    Overwrite,
}

impl std::str::FromStr for WriteMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" | "a" => Ok(Self::Append),
            "overwrite" | "w" => Ok(Self::Overwrite),
            other => Err(AppError::Config(format!("unknown write mode: {other}"))),
        }
    }
}

/// Which sink the CLI writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Sorted newline-separated text file.
    #[default]
    File,
    /// SQLite database, one row per input key.
    Sqlite,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sink used by the CLI.
    pub sink: SinkKind,
    /// File sink write mode.
    pub mode: WriteMode,
    /// Directory for output files when no explicit path is given.
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::File,
            mode: WriteMode::Append,
            directory: PathBuf::from("results"),
        }
    }
}

/// Status service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Directory holding job inputs, outputs, and the job snapshot.
    pub storage_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
            storage_dir: default_storage_dir(),
        }
    }
}

/// Returns the default job storage directory: `{data_dir}/subsift/jobs`.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("subsift").join("jobs"))
        .unwrap_or_else(|| PathBuf::from("jobs"))
}

impl SubsiftConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/subsift/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("subsift").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("subsift")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/subsift-config/config.toml")
        }
    }

    /// Load from `path` if given, else from the default path if it exists,
    /// else defaults. Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be parsed or the result
    /// is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Self::default_config_path();
                if default.is_file() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_port_override(std::env::var("PORT").ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply a `PORT` environment value, as set by hosting platforms.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the value is not a valid port.
    pub fn apply_port_override(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(raw) = value {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("invalid PORT value: {raw}")))?;
        }
        Ok(())
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.batch
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        if self.server.host.trim().is_empty() {
            return Err(AppError::Config("server.host must not be empty".into()));
        }
        Ok(())
    }
}
