//! Per-cycle exclusive file lock, read-mutate-write-atomic persistence
//! (spec.md §5, "Heating-cycle records").

use super::cycle::HeatingCycle;
use crate::config::StorageLayout;
use crate::error::{EngineError, Result};
use fs2::FileExt;
use std::io::Write as _;

#[derive(Clone)]
pub struct CycleStore {
    storage: StorageLayout,
}

impl CycleStore {
    pub fn new(storage: StorageLayout) -> Self {
        Self { storage }
    }

    pub fn save(&self, cycle: &HeatingCycle) -> Result<()> {
        std::fs::create_dir_all(self.storage.heating_cycles_dir())?;
        let path = self.storage.cycle_file(&cycle.cycle_id);
        let lock_path = path.with_extension("lock");
        let lock_file = std::fs::File::create(&lock_path)?;
        lock_file.lock_exclusive()?;

        let temp_path = path.with_extension("tmp");
        {
            let mut temp = std::fs::File::create(&temp_path)?;
            temp.write_all(serde_json::to_string_pretty(cycle)?.as_bytes())?;
            temp.sync_all().ok();
        }
        std::fs::rename(&temp_path, &path)?;

        fs2::FileExt::unlock(&lock_file).ok();
        Ok(())
    }

    pub fn get(&self, cycle_id: &str) -> Result<HeatingCycle> {
        let contents = std::fs::read_to_string(self.storage.cycle_file(cycle_id)).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(cycle_id.to_string()).into()
            } else {
                crate::error::Error::Io(error)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Find the single cycle currently in `heating` status, if any
    /// (spec.md §3, "at most one cycle in status heating at any time").
    pub fn active(&self) -> Result<Option<HeatingCycle>> {
        let dir = self.storage.heating_cycles_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.ends_with(".json") {
                continue;
            }
            let Ok(contents) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            if let Ok(cycle) = serde_json::from_str::<HeatingCycle>(&contents) {
                if cycle.status == super::cycle::CycleStatus::Heating {
                    return Ok(Some(cycle));
                }
            }
        }
        Ok(None)
    }
}
