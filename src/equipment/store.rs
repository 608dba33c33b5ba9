//! `EquipmentStatusStore` (spec.md §4.3): a single JSON-shaped record file
//! for heater/pump on/off state. Every write takes an exclusive file lock,
//! reads, mutates, and writes atomically; `last_changed_at` only moves on
//! an edge.

use crate::config::StorageLayout;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::io::Write as _;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct DeviceStatus {
    pub on: bool,
    pub last_changed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentStatus {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub heater: DeviceStatus,
    pub pump: DeviceStatus,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for EquipmentStatus {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            heater: DeviceStatus::default(),
            pump: DeviceStatus::default(),
        }
    }
}

#[derive(Clone)]
pub struct EquipmentStatusStore {
    file_path: std::path::PathBuf,
    lock_path: std::path::PathBuf,
}

impl EquipmentStatusStore {
    pub fn new(storage: &StorageLayout) -> Self {
        Self {
            file_path: storage.equipment_status_file(),
            lock_path: storage.equipment_status_file().with_extension("lock"),
        }
    }

    pub fn get(&self) -> Result<EquipmentStatus> {
        match std::fs::read_to_string(&self.file_path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(EquipmentStatus::default())
            }
            Err(error) => Err(Error::Io(error)),
        }
    }

    /// Set the heater's `on` value, recording a new `last_changed_at` only
    /// if the value actually flips.
    pub fn set_heater(&self, on: bool, at: DateTime<Utc>) -> Result<EquipmentStatus> {
        self.mutate(|status| {
            if status.heater.on != on {
                status.heater.on = on;
                status.heater.last_changed_at = Some(at);
            }
        })
    }

    pub fn set_pump(&self, on: bool, at: DateTime<Utc>) -> Result<EquipmentStatus> {
        self.mutate(|status| {
            if status.pump.on != on {
                status.pump.on = on;
                status.pump.last_changed_at = Some(at);
            }
        })
    }

    fn mutate(&self, update: impl FnOnce(&mut EquipmentStatus)) -> Result<EquipmentStatus> {
        let lock_file = std::fs::File::create(&self.lock_path)?;
        lock_file.lock_exclusive()?;

        let mut status = self.get()?;
        update(&mut status);

        let temp_path = self.file_path.with_extension("tmp");
        {
            let mut temp = std::fs::File::create(&temp_path)?;
            temp.write_all(serde_json::to_string_pretty(&status)?.as_bytes())?;
            temp.sync_all().ok();
        }
        std::fs::rename(&temp_path, &self.file_path)?;

        fs2::FileExt::unlock(&lock_file).ok();
        Ok(status)
    }
}
