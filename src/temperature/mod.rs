//! `TemperatureProvider` (spec.md §4.5): a unified read interface over the
//! polled cloud sensor and the push-based microcontroller.

mod cloud;
mod push;

pub use cloud::CloudTemperatureProvider;
pub use push::PushTemperatureProvider;

use crate::error::{Result, TemperatureError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readings older than this relative to `received_at` are rejected
/// regardless of source (spec.md §3, "staleness bound").
pub const STALENESS_BOUND_SECONDS: i64 = 15 * 60;
const MIN_WATER_TEMP_C: f64 = -10.0;
const MAX_WATER_TEMP_C: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTag {
    CloudCached,
    CloudFresh,
    MicrocontrollerPush,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub water_temp_c: Option<f64>,
    pub ambient_temp_c: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub signal_dbm: Option<i32>,
    pub source_timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub source_tag: SourceTag,
}

impl TemperatureReading {
    /// A reading is valid iff `water_temp_c` is present, in the plausible
    /// range, and not stale (spec.md §3).
    pub fn validate(self) -> Result<Self> {
        let water_temp_c = self.water_temp_c.ok_or_else(|| {
            TemperatureError::InvalidReading("water_temp_c missing".to_string())
        })?;

        if !(MIN_WATER_TEMP_C..=MAX_WATER_TEMP_C).contains(&water_temp_c) {
            return Err(TemperatureError::InvalidReading(format!(
                "water_temp_c {water_temp_c} out of plausible range"
            ))
            .into());
        }

        let age = (self.received_at - self.source_timestamp).num_seconds();
        if age > STALENESS_BOUND_SECONDS {
            return Err(TemperatureError::InvalidReading(format!(
                "reading is {age}s stale, exceeds bound of {STALENESS_BOUND_SECONDS}s"
            ))
            .into());
        }

        Ok(self)
    }

    pub fn water_temp_f(&self) -> Option<f64> {
        self.water_temp_c.map(celsius_to_fahrenheit)
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Capability shared by the cloud-polled and microcontroller-push
/// implementations.
#[async_trait]
pub trait TemperatureProvider: Send + Sync {
    /// Latest known sample, without forcing a hardware read.
    async fn read_cached(&self) -> Result<TemperatureReading>;

    /// A reading taken (or requested) right now, used when a precise
    /// decision is needed.
    async fn read_fresh(&self) -> Result<TemperatureReading>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reading(water_temp_c: Option<f64>, age_seconds: i64) -> TemperatureReading {
        let received_at = Utc::now();
        TemperatureReading {
            water_temp_c,
            ambient_temp_c: Some(24.0),
            battery_voltage: Some(3.7),
            signal_dbm: Some(-60),
            source_timestamp: received_at - Duration::seconds(age_seconds),
            received_at,
            source_tag: SourceTag::CloudFresh,
        }
    }

    #[test]
    fn validate_accepts_a_fresh_in_range_reading() {
        assert!(reading(Some(38.0), 30).validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_water_temp() {
        assert!(reading(None, 0).validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_water_temp() {
        assert!(reading(Some(200.0), 0).validate().is_err());
        assert!(reading(Some(-50.0), 0).validate().is_err());
    }

    #[test]
    fn validate_rejects_stale_reading() {
        assert!(reading(Some(38.0), STALENESS_BOUND_SECONDS + 1).validate().is_err());
    }

    #[test]
    fn validate_accepts_reading_exactly_at_staleness_bound() {
        assert!(reading(Some(38.0), STALENESS_BOUND_SECONDS).validate().is_ok());
    }

    #[test]
    fn celsius_fahrenheit_round_trip() {
        assert!((celsius_to_fahrenheit(38.8889) - 102.0).abs() < 0.01);
        assert!((fahrenheit_to_celsius(102.0) - 38.8889).abs() < 0.01);
    }
}
