//! `/api/schedule` handlers (spec.md §6).

use super::auth::Auth;
use super::state::AppState;
use crate::error::{Error, Result};
use crate::scheduler::JobKind;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    action: String,
    #[serde(rename = "scheduledTime")]
    scheduled_time: DateTime<Utc>,
    #[serde(default)]
    recurring: bool,
}

fn parse_action(action: &str) -> Result<JobKind> {
    match action {
        "heat_on" => Ok(JobKind::HeatOn),
        "heat_off" => Ok(JobKind::HeatOff),
        "pump_run" => Ok(JobKind::PumpRun),
        "maintenance" => Ok(JobKind::Maintenance),
        other => Err(Error::InvalidRequest(format!("unknown action '{other}'"))),
    }
}

pub async fn create(
    State(state): State<AppState>,
    auth: Auth,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<Json<serde_json::Value>> {
    let kind = parse_action(&body.action)?;

    let job = if body.recurring {
        let local = body.scheduled_time.with_timezone(&chrono_tz::UTC);
        state.scheduler.schedule_daily(
            kind,
            chrono::Timelike::hour(&local),
            chrono::Timelike::minute(&local),
            chrono_tz::UTC,
            &auth.actor,
            serde_json::Value::Null,
        )?
    } else {
        state
            .scheduler
            .schedule_one_shot(kind, body.scheduled_time, &auth.actor, serde_json::Value::Null)?
    };

    Ok(Json(json!(job)))
}

pub async fn list(State(state): State<AppState>, _auth: Auth) -> Result<Json<serde_json::Value>> {
    let jobs = state.scheduler.list()?;
    Ok(Json(json!(jobs)))
}

pub async fn cancel(
    State(state): State<AppState>,
    _auth: Auth,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.scheduler.cancel(&job_id)?;
    Ok(Json(json!({ "success": true })))
}
