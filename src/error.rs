//! Top-level error types for the hot-tub control core.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Temperature(#[from] TemperatureError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingKey(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// `CronAdapter` errors (spec.md §4.1 / §7).
#[derive(Debug, thiserror::Error)]
pub enum CronError {
    #[error("failed to read host cron table: {0}")]
    Access(String),

    #[error("failed to write host cron table (backup retained at {backup_path}): {reason}")]
    Write {
        backup_path: String,
        reason: String,
    },
}

/// `SchedulerService` errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduled time must be strictly in the future: {0}")]
    NotInFuture(String),

    #[error("job overlaps with an active heating cycle: {0}")]
    OverlappingSchedule(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid cron expression: {0}")]
    InvalidCronExpression(String),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// `WebhookClient` errors.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook dispatch for event '{event}' failed after {attempts} attempts: {reason}")]
    DispatchFailed {
        event: String,
        attempts: u32,
        reason: String,
    },
}

/// `TemperatureProvider` errors.
#[derive(Debug, thiserror::Error)]
pub enum TemperatureError {
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("sensor reading invalid or stale: {0}")]
    InvalidReading(String),
}

/// `HeatingCycleEngine` errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("safety timeout: cycle {cycle_id} exceeded {iterations} iterations")]
    SafetyTimeout { cycle_id: String, iterations: u32 },

    #[error("cycle not found: {0}")]
    NotFound(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, None),
            Error::Forbidden => (StatusCode::FORBIDDEN, None),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, None),
            Error::Scheduler(SchedulerError::NotInFuture(_)) => (StatusCode::BAD_REQUEST, None),
            Error::Scheduler(SchedulerError::OverlappingSchedule(_)) => {
                (StatusCode::BAD_REQUEST, Some("overlapping_schedule"))
            }
            Error::Scheduler(SchedulerError::NotFound(_)) => (StatusCode::NOT_FOUND, None),
            Error::Scheduler(SchedulerError::InvalidCronExpression(_)) => {
                (StatusCode::BAD_REQUEST, None)
            }
            Error::Scheduler(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            Error::Cron(CronError::Access(_)) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            Error::Cron(CronError::Write { .. }) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            Error::Webhook(_) => (StatusCode::BAD_GATEWAY, None),
            Error::Temperature(TemperatureError::SensorUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, Some("sensor_unavailable"))
            }
            Error::Temperature(TemperatureError::InvalidReading(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, Some("sensor_unavailable"))
            }
            Error::Engine(EngineError::NotFound(_)) => (StatusCode::NOT_FOUND, None),
            Error::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            Error::Config(_) | Error::Io(_) | Error::Serde(_) | Error::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let mut body = json!({ "error": self.to_string() });
        if let Some(code) = error_code {
            body["error_code"] = json!(code);
        }

        (status, Json(body)).into_response()
    }
}
