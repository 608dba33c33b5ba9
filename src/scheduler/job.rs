//! `ScheduledJob` record (spec.md §3), persisted one-per-file under
//! `scheduled-jobs/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    HeatOn,
    HeatOff,
    PumpRun,
    MonitorTick,
    Maintenance,
}

impl JobKind {
    /// The loopback endpoint the runner invokes for this kind, unless the
    /// job carries an explicit override.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            JobKind::HeatOn => "/internal/heat-on",
            JobKind::HeatOff => "/internal/heat-off",
            JobKind::PumpRun => "/internal/pump-run",
            JobKind::MonitorTick => "/internal/monitor-tick",
            JobKind::Maintenance => "/internal/maintenance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub job_id: String,
    pub kind: JobKind,
    pub scheduled_time: DateTime<Utc>,
    pub recurring: bool,
    pub cron_expression: Option<String>,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
    pub owner: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}
