//! Configuration
//!
//! Both configuration structs are plain JSON documents. Every field except
//! `data_dir` has a default, so `{}` is a valid persistence config and
//! `{"data_dir": "..."}` a valid file store config.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Severity};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for [`PersistenceController`](crate::persistence::PersistenceController)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Bound for every store round-trip, in milliseconds (None = unbounded)
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,

    /// Retry a create once with a fresh id when a generated id collides
    #[serde(default = "default_retry_generated_id")]
    pub retry_generated_id_on_collision: bool,

    /// Attempts for writing one pointer record before giving up
    #[serde(default = "default_pointer_write_attempts")]
    pub pointer_write_attempts: u32,

    /// Pass the held CAS to `delete` on every destroy
    #[serde(default)]
    pub destroy_with_cas: bool,
}

fn default_retry_generated_id() -> bool {
    true
}

fn default_pointer_write_attempts() -> u32 {
    3
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: None,
            retry_generated_id_on_collision: default_retry_generated_id(),
            pointer_write_attempts: default_pointer_write_attempts(),
            destroy_with_cas: false,
        }
    }
}

impl PersistenceConfig {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let config: Self = load_json(path)?;
        config.validate()?;
        log_event_with_fields(
            Severity::Info,
            Event::ConfigLoaded,
            &[("kind", "persistence"), ("path", &path.display().to_string())],
        );
        Ok(config)
    }

    /// Round-trip bound as a `Duration`
    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.op_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "op_timeout_ms must be positive when set".into(),
            ));
        }
        if self.pointer_write_attempts == 0 {
            return Err(ConfigError::Invalid(
                "pointer_write_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for [`FileStore`](crate::store::FileStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Directory holding the store log (required)
    pub data_dir: PathBuf,

    /// fsync after every appended record
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,

    /// Log file name inside `data_dir`
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
}

fn default_sync_writes() -> bool {
    true
}

fn default_log_file_name() -> String {
    "aerodoc.log".to_string()
}

impl FileStoreConfig {
    /// Config for `data_dir` with defaults everywhere else.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync_writes: default_sync_writes(),
            log_file_name: default_log_file_name(),
        }
    }

    /// Loads and validates a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let config: Self = load_json(path)?;
        config.validate()?;
        log_event_with_fields(
            Severity::Info,
            Event::ConfigLoaded,
            &[("kind", "file_store"), ("path", &path.display().to_string())],
        );
        Ok(config)
    }

    /// Full path of the log file
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }

    /// Rejects empty directories and file names that escape `data_dir`.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.log_file_name.is_empty()
            || self.log_file_name.contains('/')
            || self.log_file_name.contains('\\')
        {
            return Err(ConfigError::Invalid(format!(
                "log_file_name must be a plain file name, got '{}'",
                self.log_file_name
            )));
        }
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
