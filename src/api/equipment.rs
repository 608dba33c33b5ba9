//! `/api/equipment/*` handlers (spec.md §6).

use super::auth::Auth;
use super::state::AppState;
use crate::error::Result;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

pub async fn heater_on(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    state.equipment.heater_on().await?;
    Ok(Json(json!({
        "success": true,
        "action": "heater_on",
        "timestamp": Utc::now(),
    })))
}

pub async fn heater_off(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    state.equipment.heater_off().await?;
    Ok(Json(json!({
        "success": true,
        "action": "heater_off",
        "timestamp": Utc::now(),
    })))
}

pub async fn pump_run(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    state.equipment.pump_run().await?;
    Ok(Json(json!({
        "success": true,
        "action": "pump_run",
        "timestamp": Utc::now(),
    })))
}
