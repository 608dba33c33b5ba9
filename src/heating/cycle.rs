//! `HeatingCycle` record (spec.md §3): the persistent state the engine
//! advances one tick at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Heating,
    Completed,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatingCycle {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub cycle_id: String,
    pub started_at: DateTime<Utc>,
    pub status: CycleStatus,
    pub target_temp_c: f64,
    pub current_temp_c: Option<f64>,
    pub last_check: DateTime<Utc>,
    pub safety_counter: u32,
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub invalid_read_count: u32,
    #[serde(default)]
    pub precision_mode: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl HeatingCycle {
    pub fn new(cycle_id: String, target_temp_c: f64, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cycle_id,
            started_at: now,
            status: CycleStatus::Heating,
            target_temp_c,
            current_temp_c: None,
            last_check: now,
            safety_counter: 0,
            estimated_completion: None,
            metadata: serde_json::Value::Null,
            invalid_read_count: 0,
            precision_mode: false,
        }
    }
}
