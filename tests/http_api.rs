//! End-to-end HTTP scenarios (spec.md §8), driven through the real
//! `axum::Router` with `tower::ServiceExt::oneshot` rather than by calling
//! handlers directly, so routing, extractors, and state wiring are all
//! exercised together. The webhook/cron/sensor backends are all in `stub`/
//! file mode, so these run deterministically with no network or host-cron
//! access.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hottub_core::api::server::build_router;
use hottub_core::api::state::AppState;
use hottub_core::config::{AppConfig, ExternalApiMode, StorageLayout};
use hottub_core::coordinator::HeatTargetCoordinator;
use hottub_core::cron::{CronAdapter, CronBackend};
use hottub_core::equipment::{EquipmentService, EquipmentStatusStore};
use hottub_core::heating::{CycleStore, HeatingCycleEngine};
use hottub_core::scheduler::SchedulerService;
use hottub_core::settings::SettingsStore;
use hottub_core::temperature::PushTemperatureProvider;
use hottub_core::time::TimeService;
use hottub_core::webhook::WebhookClient;
use std::sync::Arc;
use tower::ServiceExt as _;

const BEARER: &str = "test-token";

fn build_state(dir: &std::path::Path) -> AppState {
    let storage = StorageLayout::new_for_test(dir.to_path_buf());
    let config = Arc::new(AppConfig {
        external_api_mode: ExternalApiMode::Stub,
        webhook_key: None,
        sensor_oauth_token: None,
        sensor_device_id: None,
        runner_bearer_token: "runner-token".to_string(),
        api_base_url: "http://127.0.0.1:8787".to_string(),
        esp32_api_key: "esp32-key".to_string(),
        storage: storage.clone(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        couple_heater_to_pump: true,
        heating_rate_f_per_min: 0.5,
        blinds_enabled: true,
    });

    let time = TimeService::with_timezone(chrono_tz::UTC);
    let cron = CronAdapter::new(CronBackend::File, &storage);
    let scheduler = Arc::new(SchedulerService::new(cron, time, storage.clone()));

    let webhook = WebhookClient::new(&config);
    let equipment = Arc::new(EquipmentService::new(
        EquipmentStatusStore::new(&storage),
        webhook.clone(),
        config.couple_heater_to_pump,
    ));

    let push_temperature = Arc::new(PushTemperatureProvider::new(&storage));
    let engine = Arc::new(HeatingCycleEngine::new(
        CycleStore::new(storage.clone()),
        push_temperature.clone(),
        Some(push_temperature.clone()),
        equipment.clone(),
        scheduler.clone(),
        webhook,
    ));

    let settings = Arc::new(SettingsStore::load(&storage).unwrap());
    let coordinator = Arc::new(HeatTargetCoordinator::new(
        equipment.clone(),
        engine.clone(),
        settings.clone(),
        scheduler.clone(),
        config.heating_rate_f_per_min,
    ));

    AppState {
        config,
        equipment,
        cloud_temperature: None,
        push_temperature,
        scheduler,
        engine,
        coordinator,
        settings,
        started_at: chrono::Utc::now(),
    }
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {BEARER}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_requires_a_bearer_token() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(build_state(dir.path()));

    let unauthenticated = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(unauthenticated).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let authenticated = authed("GET", "/api/health");
    let response = router.oneshot(authenticated).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn heater_on_then_off_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(build_state(dir.path()));

    let on = router
        .clone()
        .oneshot(authed("POST", "/api/equipment/heater/on"))
        .await
        .unwrap();
    assert_eq!(on.status(), StatusCode::OK);

    let off = router
        .oneshot(authed("POST", "/api/equipment/heater/off"))
        .await
        .unwrap();
    assert_eq!(off.status(), StatusCode::OK);
}

#[tokio::test]
async fn schedule_create_list_then_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(build_state(dir.path()));

    let scheduled_time = (chrono::Utc::now() + chrono::Duration::minutes(10)).to_rfc3339();
    let body = serde_json::json!({
        "action": "pump_run",
        "scheduledTime": scheduled_time,
        "recurring": false,
    });
    let create = Request::builder()
        .method("POST")
        .uri("/api/schedule")
        .header("authorization", format!("Bearer {BEARER}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = router.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let job: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let job_id = job["job_id"].as_str().unwrap().to_string();

    let listed = router
        .clone()
        .oneshot(authed("GET", "/api/schedule"))
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(listed.into_body(), usize::MAX).await.unwrap();
    let jobs: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(jobs.as_array().unwrap().len(), 1);

    let cancel = router
        .clone()
        .oneshot(authed("DELETE", &format!("/api/schedule/{job_id}")))
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);

    let listed_after = router
        .oneshot(authed("GET", "/api/schedule"))
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(listed_after.into_body(), usize::MAX).await.unwrap();
    let jobs: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn esp32_push_is_rejected_without_the_device_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(build_state(dir.path()));

    let body = serde_json::json!({ "water_temp_c": 38.0 });
    let request = Request::builder()
        .method("POST")
        .uri("/api/esp32/temperature")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn esp32_push_with_the_device_api_key_is_accepted_and_returns_an_interval() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(build_state(dir.path()));

    let body = serde_json::json!({ "water_temp_c": 38.0 });
    let request = Request::builder()
        .method("POST")
        .uri("/api/esp32/temperature")
        .header("content-type", "application/json")
        .header("x-api-key", "esp32-key")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(payload["interval_seconds"].is_number());
}
