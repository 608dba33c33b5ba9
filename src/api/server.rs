//! axum router composition (spec.md §6).

use super::state::AppState;
use super::{equipment, esp32, health, internal, schedule, temperature};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/equipment/heater/on", post(equipment::heater_on))
        .route("/api/equipment/heater/off", post(equipment::heater_off))
        .route("/api/equipment/pump/run", post(equipment::pump_run))
        .route("/api/temperature", get(temperature::latest))
        .route("/api/temperature/all", get(temperature::all))
        .route("/api/esp32/temperature", post(esp32::push_temperature))
        .route("/api/esp32/firmware/download", get(esp32::download_firmware))
        .route("/api/schedule", post(schedule::create).get(schedule::list))
        .route("/api/schedule/{id}", delete(schedule::cancel))
        .route("/api/health", get(health::health))
        .route("/internal/heat-on", post(internal::heat_on))
        .route("/internal/heat-off", post(internal::heat_off))
        .route("/internal/pump-run", post(internal::pump_run))
        .route("/internal/monitor-tick", post(internal::monitor_tick))
        .route("/internal/maintenance", post(internal::maintenance))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
