//! `/api/temperature*` handlers (spec.md §6).

use super::auth::Auth;
use super::state::AppState;
use crate::error::Result;
use axum::extract::State;
use axum::Json;
use crate::temperature::TemperatureProvider as _;
use serde_json::{json, Value};

/// Latest valid reading, preferring the push source when one has ever
/// reported in (the cloud sensor costs battery per poll).
pub async fn latest(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    if let Ok(reading) = state.push_temperature.read_cached().await {
        return Ok(Json(serde_json::to_value(reading)?));
    }
    if let Some(cloud) = &state.cloud_temperature {
        let reading = cloud.read_cached().await?;
        return Ok(Json(serde_json::to_value(reading)?));
    }
    Err(crate::error::TemperatureError::SensorUnavailable("no temperature source configured".into()).into())
}

pub async fn all(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    let push = state.push_temperature.read_cached().await.ok();
    let cloud = match &state.cloud_temperature {
        Some(provider) => provider.read_cached().await.ok(),
        None => None,
    };

    Ok(Json(json!({
        "microcontroller_push": push,
        "cloud": cloud,
    })))
}
