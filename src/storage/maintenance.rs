//! Maintenance mode state record.
//!
//! While enabled, sample ingestion is paused. Windows and cycles are not
//! affected.

use crate::core::types::optional_timestamp_format;
use crate::core::{Result, RollupError};
use crate::storage::persistence::write_json_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persisted maintenance flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceState {
    /// Ingestion paused
    pub enabled: bool,
    /// When the flag last changed
    #[serde(default, with = "optional_timestamp_format")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Handle on the maintenance state file.
#[derive(Debug, Clone)]
pub struct MaintenanceFile {
    path: PathBuf,
}

impl MaintenanceFile {
    /// Handle on `path`; nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. A missing file means disabled; a corrupt one is
    /// reported and also read as disabled.
    pub fn load(&self) -> MaintenanceState {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "corrupt maintenance state, assuming disabled");
                MaintenanceState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MaintenanceState::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read maintenance state, assuming disabled");
                MaintenanceState::default()
            },
        }
    }

    /// Shorthand for `load().enabled`.
    pub fn is_enabled(&self) -> bool {
        self.load().enabled
    }

    /// Write a state record atomically, creating the parent directory.
    pub fn save(&self, state: &MaintenanceState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RollupError::persist(parent, e))?;
        }
        write_json_atomic(&self.path, state)
    }

    /// Set the flag and persist it.
    pub fn set(&self, enabled: bool, now: DateTime<Utc>) -> Result<MaintenanceState> {
        let state = MaintenanceState {
            enabled,
            updated_at: Some(now),
        };
        self.save(&state)?;
        info!(enabled, "maintenance mode updated");
        Ok(state)
    }

    /// Flip the flag and persist it.
    pub fn toggle(&self, now: DateTime<Utc>) -> Result<MaintenanceState> {
        let current = self.load();
        self.set(!current.enabled, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_missing_file_is_disabled() {
        let dir = TempDir::new().unwrap();
        let file = MaintenanceFile::new(dir.path().join("state/maintenance.json"));
        assert_eq!(file.load(), MaintenanceState::default());
        assert!(!file.is_enabled());
    }

    #[test]
    fn test_set_and_toggle() {
        let dir = TempDir::new().unwrap();
        let file = MaintenanceFile::new(dir.path().join("state/maintenance.json"));

        let state = file.set(true, now()).unwrap();
        assert!(state.enabled);
        assert_eq!(file.load(), state);

        let toggled = file.toggle(now()).unwrap();
        assert!(!toggled.enabled);
        assert!(!file.is_enabled());
    }

    #[test]
    fn test_corrupt_file_is_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("maintenance.json");
        fs::write(&path, "{enabled: yes").unwrap();
        assert!(!MaintenanceFile::new(path).is_enabled());
    }
}
