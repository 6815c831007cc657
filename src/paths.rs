//! Path utilities for determining data storage locations.
//!
//! The tracker keeps its database and configuration in `~/.status-tracker/` unless
//! told otherwise.

use std::path::{Path, PathBuf};

/// The base directory name for tracker data.
const DATA_DIR_NAME: &str = ".status-tracker";

/// The database filename.
pub const DATABASE_FILENAME: &str = "tracker.sqlite3";

/// The configuration filename.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Get the base data directory.
///
/// Returns `~/.status-tracker/` or `None` if the home directory
/// cannot be determined.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME))
}

/// Default database location inside a data directory.
#[must_use]
pub fn db_path_in(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILENAME)
}

/// Configuration file location inside a data directory.
#[must_use]
pub fn config_path_in(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILENAME)
}
