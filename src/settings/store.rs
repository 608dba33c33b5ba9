//! `HeatTargetSettings` (spec.md §3): a single process-wide record, kept
//! hot-reloadable behind an `ArcSwap` and persisted to disk on every
//! change.

use crate::config::StorageLayout;
use crate::error::Result;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::sync::Arc;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    StartAt,
    ReadyBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatTargetSettings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub enabled: bool,
    pub target_temp_f: f64,
    pub timezone: String,
    pub schedule_mode: ScheduleMode,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for HeatTargetSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            enabled: false,
            target_temp_f: 102.0,
            timezone: "UTC".to_string(),
            schedule_mode: ScheduleMode::StartAt,
        }
    }
}

pub struct SettingsStore {
    file_path: std::path::PathBuf,
    current: ArcSwap<HeatTargetSettings>,
}

impl SettingsStore {
    pub fn load(storage: &StorageLayout) -> Result<Self> {
        let file_path = storage.heat_target_settings_file();
        let settings = match std::fs::read_to_string(&file_path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                HeatTargetSettings::default()
            }
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            file_path,
            current: ArcSwap::from_pointee(settings),
        })
    }

    pub fn get(&self) -> Arc<HeatTargetSettings> {
        self.current.load_full()
    }

    pub fn set(&self, settings: HeatTargetSettings) -> Result<()> {
        let temp_path = self.file_path.with_extension("tmp");
        {
            let mut temp = std::fs::File::create(&temp_path)?;
            temp.write_all(serde_json::to_string_pretty(&settings)?.as_bytes())?;
            temp.sync_all().ok();
        }
        std::fs::rename(&temp_path, &self.file_path)?;
        self.current.store(Arc::new(settings));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageLayout;

    #[test]
    fn load_with_no_file_yet_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        let store = SettingsStore::load(&storage).unwrap();
        assert!(!store.get().enabled);
        assert_eq!(store.get().target_temp_f, 102.0);
    }

    #[test]
    fn set_persists_across_a_fresh_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        let store = SettingsStore::load(&storage).unwrap();
        store
            .set(HeatTargetSettings {
                enabled: true,
                target_temp_f: 100.0,
                schedule_mode: ScheduleMode::ReadyBy,
                ..HeatTargetSettings::default()
            })
            .unwrap();

        let reloaded = SettingsStore::load(&storage).unwrap();
        assert!(reloaded.get().enabled);
        assert_eq!(reloaded.get().target_temp_f, 100.0);
        assert_eq!(reloaded.get().schedule_mode, ScheduleMode::ReadyBy);
    }
}
