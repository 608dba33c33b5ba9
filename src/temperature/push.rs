//! Microcontroller-push `TemperatureProvider`: the ESP32 POSTs readings on
//! its own cadence; this module only stores the latest one and serves it
//! back (spec.md §4.5).

use super::{TemperatureProvider, TemperatureReading};
use crate::config::StorageLayout;
use crate::error::{Result, TemperatureError};
use async_trait::async_trait;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

/// Interval the device is told to use while the heater is running.
pub const INTERVAL_HEATER_ON_SECONDS: u64 = 60;
/// Interval otherwise.
pub const INTERVAL_HEATER_OFF_SECONDS: u64 = 300;
/// Interval nudged to the device while a cycle is in precision mode,
/// regardless of heater state (spec.md §4.9).
pub const INTERVAL_PRECISION_SECONDS: u64 = 15;

pub struct PushTemperatureProvider {
    file_path: std::path::PathBuf,
    precision_requested: AtomicBool,
}

impl PushTemperatureProvider {
    pub fn new(storage: &StorageLayout) -> Self {
        Self {
            file_path: storage.esp32_temperature_file(),
            precision_requested: AtomicBool::new(false),
        }
    }

    /// Record a reading pushed by the device, atomically replacing the
    /// cache file. The pushed reading is validated but the push itself is
    /// always acknowledged; the caller decides how to respond.
    pub fn record(&self, reading: TemperatureReading) -> Result<()> {
        let temp_path = self.file_path.with_extension("tmp");
        {
            let mut temp = std::fs::File::create(&temp_path)?;
            temp.write_all(serde_json::to_string_pretty(&reading)?.as_bytes())?;
            temp.sync_all().ok();
        }
        std::fs::rename(&temp_path, &self.file_path)?;
        Ok(())
    }

    fn latest(&self) -> Result<TemperatureReading> {
        let contents = std::fs::read_to_string(&self.file_path).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                TemperatureError::SensorUnavailable("no push reading received yet".into()).into()
            } else {
                crate::error::Error::Io(error)
            }
        })?;
        let reading: TemperatureReading = serde_json::from_str(&contents)?;
        reading.validate()
    }

    /// Called by the heating engine when entering precision mode so the
    /// next cadence response nudges the device to check in every
    /// `INTERVAL_PRECISION_SECONDS` regardless of heater state.
    pub fn request_precision(&self, requested: bool) {
        self.precision_requested.store(requested, Ordering::SeqCst);
    }

    /// The `interval_seconds` value to hand back in the push response.
    pub fn next_interval_seconds(&self, heater_on: bool) -> u64 {
        if self.precision_requested.load(Ordering::SeqCst) {
            INTERVAL_PRECISION_SECONDS
        } else if heater_on {
            INTERVAL_HEATER_ON_SECONDS
        } else {
            INTERVAL_HEATER_OFF_SECONDS
        }
    }
}

#[async_trait]
impl TemperatureProvider for PushTemperatureProvider {
    async fn read_cached(&self) -> Result<TemperatureReading> {
        self.latest()
    }

    /// The device drives the cadence; a "fresh" read is whatever it last
    /// pushed, tagged the same as a cached one's contents but via the
    /// `microcontroller_push` source tag already stored on it.
    async fn read_fresh(&self) -> Result<TemperatureReading> {
        self.latest()
    }
}
