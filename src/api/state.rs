//! Composition root (spec.md §9, "re-cast as an explicit configuration
//! record threaded through constructors"): every component wired once at
//! startup and shared behind `Arc` as axum state.

use crate::config::AppConfig;
use crate::coordinator::HeatTargetCoordinator;
use crate::equipment::EquipmentService;
use crate::heating::HeatingCycleEngine;
use crate::scheduler::SchedulerService;
use crate::settings::SettingsStore;
use crate::temperature::{PushTemperatureProvider, TemperatureProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub equipment: Arc<EquipmentService>,
    pub cloud_temperature: Option<Arc<dyn TemperatureProvider>>,
    pub push_temperature: Arc<PushTemperatureProvider>,
    pub scheduler: Arc<SchedulerService>,
    pub engine: Arc<HeatingCycleEngine>,
    pub coordinator: Arc<HeatTargetCoordinator>,
    pub settings: Arc<SettingsStore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
