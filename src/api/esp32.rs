//! `/api/esp32/*` handlers (spec.md §4.5, §6): push ingestion and firmware
//! download, both keyed on the device API key rather than a bearer token.

use super::auth::Esp32Auth;
use super::state::AppState;
use crate::error::Result;
use crate::temperature::{SourceTag, TemperatureReading};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct Esp32PushBody {
    water_temp_c: Option<f64>,
    battery_voltage: Option<f64>,
    signal_dbm: Option<i32>,
    #[serde(default = "Utc::now")]
    source_timestamp: chrono::DateTime<Utc>,
    firmware_version: Option<u32>,
}

pub async fn push_temperature(
    State(state): State<AppState>,
    _auth: Esp32Auth,
    Json(body): Json<Esp32PushBody>,
) -> Result<Json<serde_json::Value>> {
    let reading = TemperatureReading {
        water_temp_c: body.water_temp_c,
        ambient_temp_c: None,
        battery_voltage: body.battery_voltage,
        signal_dbm: body.signal_dbm,
        source_timestamp: body.source_timestamp,
        received_at: Utc::now(),
        source_tag: SourceTag::MicrocontrollerPush,
    };
    state.push_temperature.record(reading)?;

    let heater_on = state.equipment.status()?.heater.on;
    let interval_seconds = state.push_temperature.next_interval_seconds(heater_on);

    let mut response = json!({
        "status": "ok",
        "interval_seconds": interval_seconds,
    });

    if let Some((version, url)) = newer_firmware(&state, body.firmware_version)? {
        response["firmware_version"] = json!(version);
        response["firmware_url"] = json!(url);
    }

    Ok(Json(response))
}

#[derive(Deserialize)]
struct FirmwareConfig {
    version: u32,
    filename: String,
}

fn newer_firmware(state: &AppState, device_version: Option<u32>) -> Result<Option<(u32, String)>> {
    let contents = match std::fs::read_to_string(state.config.storage.firmware_config_file()) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let config: FirmwareConfig = serde_json::from_str(&contents)?;

    if device_version.map(|v| config.version > v).unwrap_or(true) {
        let url = format!(
            "{}/api/esp32/firmware/download",
            state.config.api_base_url.trim_end_matches('/')
        );
        Ok(Some((config.version, url)))
    } else {
        Ok(None)
    }
}

pub async fn download_firmware(State(state): State<AppState>, _auth: Esp32Auth) -> Result<impl IntoResponse> {
    let contents = std::fs::read_to_string(state.config.storage.firmware_config_file())
        .map_err(crate::error::Error::Io)?;
    let config: FirmwareConfig = serde_json::from_str(&contents)?;

    let binary = std::fs::read(state.config.storage.firmware_dir().join(&config.filename))
        .map_err(crate::error::Error::Io)?;

    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/octet-stream".parse().unwrap());
    headers.insert(
        header::HeaderName::from_static("x-firmware-version"),
        config.version.to_string().parse().unwrap(),
    );

    Ok((headers, binary))
}
