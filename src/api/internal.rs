//! Loopback endpoints the runner invokes at job fire time (spec.md §4.7
//! step 4). Bearer-authenticated like the user-facing endpoints, but only
//! the `Runner` role is expected to call them in practice.

use super::auth::Auth;
use super::state::AppState;
use crate::error::Result;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn heat_on(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    state.coordinator.handle_heat_on().await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn heat_off(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    state.equipment.heater_off().await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn pump_run(State(state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    state.equipment.pump_run().await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct MonitorTickQuery {
    cycle_id: String,
}

pub async fn monitor_tick(
    State(state): State<AppState>,
    _auth: Auth,
    Query(query): Query<MonitorTickQuery>,
) -> Result<Json<Value>> {
    state.engine.tick(&query.cycle_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn maintenance(State(_state): State<AppState>, _auth: Auth) -> Result<Json<Value>> {
    Ok(Json(json!({ "success": true })))
}
