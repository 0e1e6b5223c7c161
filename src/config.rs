//! Store configuration
//!
//! Loaded from a JSON file. Only `data_dir` is required; everything else
//! has a default. Validation runs on load, so a `StoreConfig` in hand is
//! always usable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;
use crate::store::IdentityPolicy;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which backend `open_store` builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Relational,
}

/// Relational backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Connections opened eagerly
    #[serde(default = "default_min_connections")]
    pub min_connections: usize,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// How long `acquire` waits for a free connection; `None` blocks
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,

    /// SQLite busy handler timeout
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("recordstore.db")
}
fn default_min_connections() -> usize {
    1
}
fn default_max_connections() -> usize {
    10
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Top-level configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `<entity>.csv` files (required)
    pub data_dir: PathBuf,

    /// Integrity ledger file (default `<data_dir>/hashes.json`)
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub identity_policy: IdentityPolicy,

    /// Extra `*.json` schema files loaded next to the built-in catalog
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Minimum log severity (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub relational: RelationalConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl StoreConfig {
    /// Configuration with defaults for everything but the data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ledger_path: None,
            backend: Backend::default(),
            identity_policy: IdentityPolicy::default(),
            schema_dir: None,
            log_level: default_log_level(),
            relational: RelationalConfig::default(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: StoreConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }

        self.severity()?;

        let relational = &self.relational;
        if relational.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "relational.max_connections must be > 0".into(),
            ));
        }
        if relational.min_connections > relational.max_connections {
            return Err(ConfigError::Invalid(format!(
                "relational.min_connections ({}) exceeds max_connections ({})",
                relational.min_connections, relational.max_connections
            )));
        }

        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }

    /// `<data_dir>/<entity>.csv`
    pub fn data_file(&self, entity: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", entity))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("hashes.json"))
    }
}
