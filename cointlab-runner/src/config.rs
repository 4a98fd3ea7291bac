//! Run configuration — TOML file, CLI overrides, validation.
//!
//! ```toml
//! [engine]
//! window_size = 60
//! threads = 8          # 0 = available cores
//! deadline_secs = 600  # optional
//!
//! [groups]
//! group1 = ["BTCUSDT", "ETHUSDT"]
//! group2 = ["SOLUSDT", "ADAUSDT"]
//!
//! [storage]
//! database = "cointlab.db"
//! cache_dir = "data/cache"  # optional
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use cointlab_core::rolling::MIN_WINDOW;
use cointlab_core::PlanError;

/// Default rolling window, in observations.
pub const DEFAULT_WINDOW_SIZE: usize = 60;

/// Errors that abort a run before any computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("missing symbol group '{0}'")]
    MissingGroup(&'static str),

    #[error("symbol group '{0}' is empty")]
    EmptyGroup(&'static str),

    #[error("window size must be at least 2, got {0}")]
    WindowTooSmall(usize),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// `[engine]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub window_size: usize,
    /// Worker threads; 0 means one per available core.
    pub threads: usize,
    pub deadline_secs: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            threads: 0,
            deadline_secs: None,
        }
    }
}

/// `[groups]` table. Groups are never defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    pub group1: Option<Vec<String>>,
    pub group2: Option<Vec<String>>,
}

/// `[storage]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database: PathBuf,
    pub cache_dir: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("cointlab.db"),
            cache_dir: None,
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineSettings,
    pub groups: GroupSettings,
    pub storage: StorageSettings,
}

/// Validated symbol groups.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolGroups<'a> {
    pub group1: &'a [String],
    pub group2: &'a [String],
}

impl RunConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check everything that can be checked without data.
    pub fn validate(&self) -> Result<SymbolGroups<'_>, ConfigError> {
        if self.engine.window_size < MIN_WINDOW {
            return Err(ConfigError::WindowTooSmall(self.engine.window_size));
        }
        let group1 = require_group(self.groups.group1.as_deref(), "group1")?;
        let group2 = require_group(self.groups.group2.as_deref(), "group2")?;
        Ok(SymbolGroups { group1, group2 })
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.engine.deadline_secs.map(Duration::from_secs)
    }

    /// Deterministic BLAKE3 hash of the configuration.
    pub fn fingerprint(&self) -> String {
        match serde_json::to_vec(self) {
            Ok(bytes) => blake3::hash(&bytes).to_hex().to_string(),
            Err(_) => String::new(),
        }
    }
}

fn require_group<'a>(
    group: Option<&'a [String]>,
    name: &'static str,
) -> Result<&'a [String], ConfigError> {
    match group {
        None => Err(ConfigError::MissingGroup(name)),
        Some([]) => Err(ConfigError::EmptyGroup(name)),
        Some(symbols) => Ok(symbols),
    }
}
