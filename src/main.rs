//! `hottub-core` server entry point: loads configuration, wires every
//! component once at the composition root, and serves the HTTP API.

use hottub_core::api::server::build_router;
use hottub_core::api::state::AppState;
use hottub_core::config::AppConfig;
use hottub_core::coordinator::HeatTargetCoordinator;
use hottub_core::cron::{CronAdapter, CronBackend};
use hottub_core::equipment::{EquipmentService, EquipmentStatusStore};
use hottub_core::heating::{CycleStore, HeatingCycleEngine};
use hottub_core::scheduler::SchedulerService;
use hottub_core::settings::SettingsStore;
use hottub_core::temperature::{CloudTemperatureProvider, PushTemperatureProvider, TemperatureProvider};
use hottub_core::time::TimeService;
use hottub_core::webhook::WebhookClient;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let _telemetry_guards = hottub_core::telemetry::init(&config.storage)?;

    tracing::info!(
        mode = ?config.external_api_mode,
        bind = %config.bind_addr,
        "starting hottub-core"
    );

    let time = TimeService::discover();
    let cron_backend = if config.external_api_mode.is_live() {
        CronBackend::Live
    } else {
        CronBackend::File
    };
    let cron = CronAdapter::new(cron_backend, &config.storage);
    let scheduler = Arc::new(SchedulerService::new(cron, time, config.storage.clone()));

    let webhook = WebhookClient::new(&config);
    let equipment_store = EquipmentStatusStore::new(&config.storage);
    let equipment = Arc::new(EquipmentService::new(
        equipment_store,
        webhook.clone(),
        config.couple_heater_to_pump,
    ));

    let push_temperature = Arc::new(PushTemperatureProvider::new(&config.storage));

    let cloud_temperature: Option<Arc<dyn TemperatureProvider>> =
        match (&config.sensor_oauth_token, &config.sensor_device_id) {
            (Some(token), Some(device_id)) => Some(Arc::new(CloudTemperatureProvider::new(
                config.api_base_url.clone(),
                token.clone(),
                device_id.clone(),
            ))),
            _ => None,
        };

    let active_provider: Arc<dyn TemperatureProvider> = cloud_temperature
        .clone()
        .unwrap_or_else(|| push_temperature.clone() as Arc<dyn TemperatureProvider>);

    let cycles = CycleStore::new(config.storage.clone());
    let engine = Arc::new(HeatingCycleEngine::new(
        cycles,
        active_provider,
        Some(push_temperature.clone()),
        equipment.clone(),
        scheduler.clone(),
        webhook.clone(),
    ));

    let settings = Arc::new(SettingsStore::load(&config.storage)?);
    let coordinator = Arc::new(HeatTargetCoordinator::new(
        equipment.clone(),
        engine.clone(),
        settings.clone(),
        scheduler.clone(),
        config.heating_rate_f_per_min,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        equipment,
        cloud_temperature,
        push_temperature,
        scheduler,
        engine,
        coordinator,
        settings,
        started_at: chrono::Utc::now(),
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(bind = %config.bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
