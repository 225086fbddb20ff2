use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GateSettings {
    pub visit_log_path: PathBuf,
    pub lock_path: PathBuf,
    pub database_path: PathBuf,
    pub aggregation_interval_secs: u64,
    /// Age after which a lock marker is considered abandoned. 0 never reclaims.
    pub stale_lock_secs: u64,
    pub tier_window_days: i64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            visit_log_path: PathBuf::from("reader-visits.log"),
            lock_path: PathBuf::from("reader-visits.log.lock"),
            database_path: PathBuf::from("campaign-gate.sqlite3"),
            aggregation_interval_secs: 600,
            stale_lock_secs: 3600,
            tier_window_days: crate::tier::DEFAULT_WINDOW_DAYS,
        }
    }
}

impl GateSettings {
    /// Resolves relative paths against `base`, typically the settings file's
    /// directory.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        for path in [
            &mut self.visit_log_path,
            &mut self.lock_path,
            &mut self.database_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<GateSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings at {}: {err}; using defaults",
                    path.display()
                );
                GateSettings::default()
            })
        } else {
            GateSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> GateSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: GateSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: GateSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &GateSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, GateSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, GateSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
