//! Cloud-polled `TemperatureProvider`: a battery-powered wireless sensor
//! reachable through a bearer-token cloud API (spec.md §4.5, §6).

use super::{SourceTag, TemperatureProvider, TemperatureReading};
use crate::error::{Result, TemperatureError};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

/// Compensates for thermal coupling between the sensor's ambient channel
/// and the water it sits in (spec.md §4.5).
const AMBIENT_CALIBRATION_OFFSET_C: f64 = -1.5;

const REFRESH_WAIT: Duration = Duration::from_millis(2_500);
const SENSOR_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_REFRESH_ATTEMPTS: u32 = 2;

#[derive(Deserialize)]
struct SensorResponse {
    temperature: Option<f64>,
    cap: Option<f64>,
    battery_voltage: Option<f64>,
    signal_dbm: Option<i32>,
    #[serde(default = "Utc::now")]
    timestamp: chrono::DateTime<Utc>,
}

pub struct CloudTemperatureProvider {
    http: reqwest::Client,
    base_url: String,
    oauth_token: String,
    device_id: String,
}

impl CloudTemperatureProvider {
    pub fn new(base_url: String, oauth_token: String, device_id: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(SENSOR_TIMEOUT)
                .build()
                .expect("build sensor http client"),
            base_url,
            oauth_token,
            device_id,
        }
    }

    async fn fetch(&self, source_tag: SourceTag) -> Result<TemperatureReading> {
        let url = format!(
            "{}/devices/{}",
            self.base_url.trim_end_matches('/'),
            self.device_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.oauth_token)
            .send()
            .await
            .map_err(|error| TemperatureError::SensorUnavailable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(TemperatureError::SensorUnavailable(format!(
                "HTTP {}",
                response.status()
            ))
            .into());
        }

        let body: SensorResponse = response
            .json()
            .await
            .map_err(|error| TemperatureError::SensorUnavailable(error.to_string()))?;

        let reading = TemperatureReading {
            water_temp_c: body.temperature,
            ambient_temp_c: body.cap.map(|c| c + AMBIENT_CALIBRATION_OFFSET_C),
            battery_voltage: body.battery_voltage,
            signal_dbm: body.signal_dbm,
            source_timestamp: body.timestamp,
            received_at: Utc::now(),
            source_tag,
        };
        reading.validate()
    }

    async fn request_refresh(&self) -> Result<()> {
        let url = format!(
            "{}/devices/{}/refresh",
            self.base_url.trim_end_matches('/'),
            self.device_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.oauth_token)
            .send()
            .await
            .map_err(|error| TemperatureError::SensorUnavailable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(TemperatureError::SensorUnavailable(format!(
                "refresh rejected with HTTP {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl TemperatureProvider for CloudTemperatureProvider {
    async fn read_cached(&self) -> Result<TemperatureReading> {
        self.fetch(SourceTag::CloudCached).await
    }

    /// Issue a refresh command, wait a bounded time, then read — retried up
    /// to `MAX_REFRESH_ATTEMPTS` times before the reading counts as invalid
    /// (spec.md §5, "Sensor fresh-read: at most 2 refresh attempts per
    /// tick").
    async fn read_fresh(&self) -> Result<TemperatureReading> {
        let mut last_error = None;
        for _ in 0..MAX_REFRESH_ATTEMPTS {
            if let Err(error) = self.request_refresh().await {
                last_error = Some(error);
                continue;
            }
            tokio::time::sleep(REFRESH_WAIT).await;
            match self.fetch(SourceTag::CloudFresh).await {
                Ok(reading) => return Ok(reading),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            TemperatureError::SensorUnavailable("refresh exhausted with no response".into()).into()
        }))
    }
}
