//! Inbound HTTP surface (spec.md §6): axum router, `{actor, role}`
//! extractor, and per-resource handlers.

pub mod auth;
mod equipment;
mod esp32;
mod health;
mod internal;
mod schedule;
pub mod server;
pub mod state;
mod temperature;

pub use state::AppState;
