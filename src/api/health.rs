//! `GET /api/health` (spec.md §6).

use super::auth::Auth;
use super::state::AppState;
use crate::error::Result;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn health(State(state): State<AppState>, _auth: Auth) -> Result<Json<serde_json::Value>> {
    let equipment_status = state.equipment.status()?;
    let settings = state.settings.get();

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime_seconds(),
        "ifttt_mode": state.config.external_api_mode.is_live(),
        "equipmentStatus": equipment_status,
        "heatTargetSettings": &*settings,
        "blindsEnabled": state.config.blinds_enabled,
    })))
}
