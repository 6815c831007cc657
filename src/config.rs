//! Configuration management for the tracker.
//!
//! Settings live in `config.yaml` inside the data directory. Every field is optional;
//! a missing file means defaults throughout.

use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the database location.
pub const DB_ENV_VAR: &str = "STATUS_TRACKER_DB";

const fn default_worker_poll_seconds() -> u64 {
    30
}

const fn default_notification_limit() -> usize {
    50
}

fn default_log_filter() -> String {
    "status_tracker=info".to_string()
}

/// Tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Database file. Relative paths resolve against the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Seconds between stale-task checks.
    #[serde(default = "default_worker_poll_seconds")]
    pub worker_poll_seconds: u64,

    /// Most notifications returned by a listing.
    #[serde(default = "default_notification_limit")]
    pub notification_limit: usize,

    /// Default `tracing` filter directive.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            worker_poll_seconds: default_worker_poll_seconds(),
            notification_limit: default_notification_limit(),
            log_filter: default_log_filter(),
        }
    }
}

impl TrackerConfig {
    /// Load config from a data directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(data_dir: &Path) -> Result<Option<Self>> {
        let config_path = paths::config_path_in(data_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Load config, falling back to defaults when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        Ok(Self::load_from(data_dir)?.unwrap_or_default())
    }

    /// Save config to a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(paths::config_path_in(data_dir), content)?;
        Ok(())
    }

    /// Interval between worker polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker_poll_seconds)
    }

    /// Resolve the database path.
    ///
    /// Order: `explicit` (flag or environment), then `database_path` from this config,
    /// then the default file in the data directory.
    #[must_use]
    pub fn resolve_db_path(&self, explicit: Option<&Path>, data_dir: &Path) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => paths::db_path_in(data_dir),
        }
    }
}

/// Ensure config exists in a data directory, writing defaults if not.
///
/// Returns the config (either loaded or newly created).
///
/// # Errors
///
/// Returns an error if config cannot be loaded or saved.
pub fn ensure_config_in(data_dir: &Path) -> Result<TrackerConfig> {
    if let Some(config) = TrackerConfig::load_from(data_dir)? {
        return Ok(config);
    }

    let config = TrackerConfig::default();
    config.save_to(data_dir)?;
    tracing::info!(path = %paths::config_path_in(data_dir).display(), "wrote default config");
    Ok(config)
}

/// Database path from the environment, if set and non-empty.
#[must_use]
pub fn db_path_from_env() -> Option<PathBuf> {
    std::env::var_os(DB_ENV_VAR).filter(|v| !v.is_empty()).map(PathBuf::from)
}
