//! Persisted application config (`config.json`).
//!
//! Holds the time of the last successful data change made through this
//! installation. The file is rewritten whole on every save; a missing or
//! unreadable file yields the defaults.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Stamped after add, edit, delete, import and export
    #[serde(default)]
    pub last_update_time: Option<NaiveDateTime>,
}

impl AppConfig {
    /// Load the config, falling back to defaults.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read config, using defaults");
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
            Self::default()
        })
    }

    /// Write the config as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Record `time` as the last update. Save failures are logged and ignored.
    pub fn stamp(path: &Path, time: NaiveDateTime) {
        let mut config = Self::load(path);
        config.last_update_time = Some(time);
        if let Err(e) = config.save(path) {
            warn!(path = %path.display(), error = %e, "Could not save config");
        }
    }
}
