//! Configuration management.
//!
//! This module resolves where panellog keeps its files and loads the small
//! persisted application config.
//!
//! # Layout
//!
//! Everything lives in one data directory:
//! - **Database**: `<data dir>/panellog.db` (entries and the durable operation log)
//! - **Fallback log**: `<data dir>/operations.log` (JSONL, used while the database is unreachable)
//! - **App config**: `<data dir>/config.json`
//!
//! The data directory is `PLOG_HOME` when set, otherwise `panellog/` under the
//! platform's local data directory.

mod app_config;

pub use app_config::AppConfig;

use std::path::{Path, PathBuf};

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "panellog.db";

/// Fallback operation log file name inside the data directory.
pub const AUDIT_FILE_NAME: &str = "operations.log";

/// App config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Read a non-blank environment variable.
fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Get the panellog data directory.
///
/// Priority:
/// 1. `PLOG_HOME` environment variable
/// 2. `<local data dir>/panellog` (e.g. `~/.local/share/panellog`)
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    env_path("PLOG_HOME")
        .or_else(|| directories::BaseDirs::new().map(|b| b.data_local_dir().join("panellog")))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided (`--db`), use it directly
/// 2. `PLOG_DB` environment variable
/// 3. `<data dir>/panellog.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    env_path("PLOG_DB").or_else(|| data_dir().map(|dir| dir.join(DB_FILE_NAME)))
}

/// Path of the local fallback operation log.
#[must_use]
pub fn audit_log_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(AUDIT_FILE_NAME))
}

/// Path of the persisted app config.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/panel.db");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_defaults_to_file_name() {
        let path = resolve_db_path(None).unwrap();
        assert!(path.ends_with(DB_FILE_NAME) || std::env::var("PLOG_DB").is_ok());
    }

    #[test]
    fn test_sibling_files_share_data_dir() {
        let dir = data_dir().unwrap();
        assert_eq!(audit_log_path().unwrap(), dir.join(AUDIT_FILE_NAME));
        assert_eq!(config_path().unwrap(), dir.join(CONFIG_FILE_NAME));
    }
}
