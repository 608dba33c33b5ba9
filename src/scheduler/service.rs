//! `SchedulerService` (spec.md §4.6): create/list/cancel scheduled jobs and
//! materialise them as cron entries invoking the runner. All absolute times
//! flow through `TimeService` exactly once; callers never format cron
//! fields themselves.

use super::job::{JobKind, ScheduledJob};
use super::job_store::JobStore;
use crate::config::StorageLayout;
use crate::cron::{CronAdapter, CronEntry};
use crate::error::{Result, SchedulerError};
use crate::time::TimeService;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Minimum lead time a newly-written cron entry must have over "now", so
/// the runner invoked for the current minute can't race the write
/// (spec.md §4.2).
const SCHEDULE_MARGIN_SECONDS: i64 = 20;

pub struct SchedulerService {
    cron: CronAdapter,
    time: TimeService,
    jobs: JobStore,
    runner_command: String,
}

impl SchedulerService {
    pub fn new(cron: CronAdapter, time: TimeService, storage: StorageLayout) -> Self {
        Self {
            cron,
            time,
            jobs: JobStore::new(storage.clone()),
            runner_command: format!("{}", storage.cron_runner_path().display()),
        }
    }

    /// Utility for callers that need the cron expression for an instant
    /// without scheduling anything (spec.md §4.6). `use_utc` bypasses
    /// system-timezone conversion for callers that already have a UTC
    /// instant expressed in cron-table terms.
    pub fn get_cron_expression(&self, instant: DateTime<Utc>, use_utc: bool) -> String {
        if use_utc {
            let utc_time = TimeService::with_timezone(chrono_tz::UTC);
            utc_time.cron_fields(instant).to_string()
        } else {
            self.time.cron_fields(instant).to_string()
        }
    }

    /// Create a one-shot job firing at `at_instant`.
    pub fn schedule_one_shot(
        &self,
        kind: JobKind,
        at_instant: DateTime<Utc>,
        owner: &str,
        payload: serde_json::Value,
    ) -> Result<ScheduledJob> {
        let now = self.time.now_utc();
        let earliest = self.time.round_up_to_minute_with_margin(now, SCHEDULE_MARGIN_SECONDS);
        if at_instant < earliest {
            return Err(SchedulerError::NotInFuture(format!(
                "{at_instant} is not at least {SCHEDULE_MARGIN_SECONDS}s in the future"
            ))
            .into());
        }

        if kind == JobKind::HeatOn && self.has_pending(JobKind::HeatOn)? {
            return Err(SchedulerError::OverlappingSchedule(
                "a heat_on job is already pending".to_string(),
            )
            .into());
        }

        let job_id = new_job_id();
        let fields = self.time.cron_fields(at_instant);
        let endpoint = match payload.get("cycle_id").and_then(|v| v.as_str()) {
            Some(cycle_id) => format!("{}?cycle_id={cycle_id}", kind.default_endpoint()),
            None => kind.default_endpoint().to_string(),
        };
        let job = ScheduledJob {
            schema_version: 1,
            job_id: job_id.clone(),
            kind,
            scheduled_time: at_instant,
            recurring: false,
            cron_expression: None,
            endpoint,
            created_at: now,
            owner: owner.to_string(),
            payload,
        };

        self.jobs.save(&job)?;
        self.cron.add(CronEntry::tagged(
            fields,
            format!("{} {}", self.runner_command, job_id),
            &job_id,
        ))?;

        Ok(job)
    }

    /// Create a recurring daily job at `local_hhmm` in `timezone`.
    pub fn schedule_daily(
        &self,
        kind: JobKind,
        local_hour: u32,
        local_minute: u32,
        timezone: Tz,
        owner: &str,
        payload: serde_json::Value,
    ) -> Result<ScheduledJob> {
        if kind == JobKind::HeatOn && self.has_pending(JobKind::HeatOn)? {
            return Err(SchedulerError::OverlappingSchedule(
                "a heat_on job is already pending".to_string(),
            )
            .into());
        }

        let next_fire = self
            .time
            .next_local_occurrence(timezone, local_hour, local_minute)
            .ok_or_else(|| SchedulerError::NotInFuture("ambiguous local time".to_string()))?;

        let fields = self.time.cron_fields(next_fire);
        let job_id = new_job_id();
        let cron_expression = format!("{} {} * * *", fields.minute, fields.hour);
        validate_cron_expression(&cron_expression)?;

        let job = ScheduledJob {
            schema_version: 1,
            job_id: job_id.clone(),
            kind,
            scheduled_time: next_fire,
            recurring: true,
            cron_expression: Some(cron_expression),
            endpoint: kind.default_endpoint().to_string(),
            created_at: self.time.now_utc(),
            owner: owner.to_string(),
            payload,
        };

        self.jobs.save(&job)?;
        self.cron.add(CronEntry {
            minute: fields.minute,
            hour: fields.hour,
            day_of_month: fields.day_of_month,
            month: fields.month,
            day_of_week: "*".to_string(),
            command: format!("{} {}", self.runner_command, job_id),
            comment: Some(format!("HOTTUB:{job_id}")),
        })?;

        Ok(job)
    }

    /// Schedule (or reschedule) a `monitor_tick` for a heating cycle.
    ///
    /// Unlike `schedule_one_shot`, a sub-margin `at_instant` is clamped up to
    /// the earliest safe cron minute rather than rejected: the cadence table
    /// (spec.md §4.9) asks for ticks as close together as 15s, well under
    /// cron's own minute granularity, and a tick's job is to keep a heating
    /// cycle advancing — it must always manage to reschedule itself, or the
    /// cycle stalls mid-heat with the heater left on.
    pub fn schedule_tick(&self, cycle_id: &str, at_instant: DateTime<Utc>, owner: &str) -> Result<ScheduledJob> {
        let now = self.time.now_utc();
        let earliest = self.time.round_up_to_minute_with_margin(now, SCHEDULE_MARGIN_SECONDS);
        let at_instant = at_instant.max(earliest);

        let job_id = new_job_id();
        let fields = self.time.cron_fields(at_instant);
        let endpoint = format!("{}?cycle_id={cycle_id}", JobKind::MonitorTick.default_endpoint());
        let job = ScheduledJob {
            schema_version: 1,
            job_id: job_id.clone(),
            kind: JobKind::MonitorTick,
            scheduled_time: at_instant,
            recurring: false,
            cron_expression: None,
            endpoint,
            created_at: now,
            owner: owner.to_string(),
            payload: serde_json::json!({ "cycle_id": cycle_id }),
        };

        self.jobs.save(&job)?;
        self.cron.add(CronEntry::tagged(
            fields,
            format!("{} {}", self.runner_command, job_id),
            &job_id,
        ))?;

        Ok(job)
    }

    /// Enumerate persisted job records, repairing divergence between the
    /// job-file store and the cron table by cancelling the orphan side
    /// (spec.md §4.6).
    pub fn list(&self) -> Result<Vec<ScheduledJob>> {
        let jobs = self.jobs.list()?;
        let cron_entries = self.cron.list()?;
        let cron_tags: std::collections::HashSet<&str> =
            cron_entries.iter().filter_map(|entry| entry.tag()).collect();

        let mut reconciled = Vec::new();
        for job in jobs {
            if job.recurring || cron_tags.contains(job.job_id.as_str()) {
                reconciled.push(job);
            } else {
                // Job file survives with no cron entry: the runner already
                // fired and removed it, or it was orphaned by a crash.
                // Either way it is no longer pending; drop the stale file.
                self.jobs.delete(&job.job_id)?;
            }
        }

        for tag in cron_tags {
            if !reconciled.iter().any(|job| job.job_id == tag) {
                self.cron.remove_matching(&format!("HOTTUB:{tag}"))?;
            }
        }

        Ok(reconciled)
    }

    /// Remove a job's cron entry and file. Idempotent: tolerates either
    /// side already being gone (spec.md §5).
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        self.cron.remove_matching(&format!("HOTTUB:{job_id}"))?;
        self.jobs.delete(job_id)?;
        Ok(())
    }

    fn has_pending(&self, kind: JobKind) -> Result<bool> {
        Ok(self.jobs.list()?.into_iter().any(|job| job.kind == kind))
    }
}

fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Confirms a standard 5-field cron expression is well-formed before it is
/// ever written to a job record, by parsing it with a leading `0` seconds
/// field and a trailing wildcard year (the `cron` crate's native form).
fn validate_cron_expression(expression: &str) -> Result<()> {
    use std::str::FromStr as _;
    cron::Schedule::from_str(&format!("0 {expression} *")).map_err(|error| {
        SchedulerError::InvalidCronExpression(format!("'{expression}': {error}"))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronBackend;

    fn service() -> (SchedulerService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        let cron = CronAdapter::new(CronBackend::File, &storage);
        let time = TimeService::with_timezone(chrono_tz::UTC);
        (SchedulerService::new(cron, time, storage), dir)
    }

    #[test]
    fn schedule_one_shot_rejects_a_time_too_close_to_now() {
        let (svc, _dir) = service();
        let soon = Utc::now() + chrono::Duration::seconds(1);
        let result = svc.schedule_one_shot(JobKind::PumpRun, soon, "test", serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn schedule_one_shot_rejects_overlapping_heat_on() {
        let (svc, _dir) = service();
        let at = Utc::now() + chrono::Duration::minutes(5);
        svc.schedule_one_shot(JobKind::HeatOn, at, "test", serde_json::json!({}))
            .unwrap();
        let second = svc.schedule_one_shot(JobKind::HeatOn, at, "test", serde_json::json!({}));
        assert!(second.is_err());
    }

    #[test]
    fn schedule_one_shot_permits_concurrent_non_heat_on_jobs() {
        let (svc, _dir) = service();
        let at = Utc::now() + chrono::Duration::minutes(5);
        svc.schedule_one_shot(JobKind::PumpRun, at, "test", serde_json::json!({}))
            .unwrap();
        assert!(svc
            .schedule_one_shot(JobKind::PumpRun, at, "test", serde_json::json!({}))
            .is_ok());
    }

    #[test]
    fn cancel_is_idempotent() {
        let (svc, _dir) = service();
        let at = Utc::now() + chrono::Duration::minutes(5);
        let job = svc
            .schedule_one_shot(JobKind::PumpRun, at, "test", serde_json::json!({}))
            .unwrap();
        svc.cancel(&job.job_id).unwrap();
        svc.cancel(&job.job_id).unwrap();
        assert!(svc.list().unwrap().is_empty());
    }

    #[test]
    fn schedule_tick_clamps_a_sub_margin_instant_instead_of_erroring() {
        let (svc, _dir) = service();
        let almost_now = Utc::now() + chrono::Duration::seconds(15);
        let job = svc.schedule_tick("cyc1", almost_now, "heating-cycle-engine").unwrap();
        assert!(job.scheduled_time >= almost_now);
        assert_eq!(job.kind, JobKind::MonitorTick);
        assert_eq!(job.endpoint, format!("{}?cycle_id=cyc1", JobKind::MonitorTick.default_endpoint()));
    }

    #[test]
    fn schedule_daily_rejects_overlapping_heat_on() {
        let (svc, _dir) = service();
        let at = Utc::now() + chrono::Duration::minutes(5);
        svc.schedule_one_shot(JobKind::HeatOn, at, "test", serde_json::json!({}))
            .unwrap();
        let daily = svc.schedule_daily(JobKind::HeatOn, 7, 30, chrono_tz::UTC, "test", serde_json::json!({}));
        assert!(daily.is_err());
    }

    #[test]
    fn schedule_daily_writes_a_standard_five_field_expression() {
        let (svc, _dir) = service();
        let job = svc
            .schedule_daily(JobKind::HeatOn, 7, 30, chrono_tz::UTC, "test", serde_json::json!({}))
            .unwrap();
        let expression = job.cron_expression.unwrap();
        assert_eq!(expression.split_whitespace().count(), 5);
        assert_eq!(expression, "30 7 * * *");
    }

    #[test]
    fn list_reconciles_a_job_file_whose_cron_entry_already_fired() {
        let (svc, dir) = service();
        let at = Utc::now() + chrono::Duration::minutes(5);
        let job = svc
            .schedule_one_shot(JobKind::PumpRun, at, "test", serde_json::json!({}))
            .unwrap();

        // Simulate the runner having already removed the cron entry without
        // deleting the job file (e.g. a crash between steps).
        let storage = StorageLayout::new_for_test(dir.path().to_path_buf());
        let cron = CronAdapter::new(CronBackend::File, &storage);
        cron.remove_matching(&format!("HOTTUB:{}", job.job_id)).unwrap();

        assert!(svc.list().unwrap().is_empty());
        // The stale job file is cleaned up as part of reconciliation.
        assert!(JobStore::new(storage).get(&job.job_id).unwrap().is_none());
    }
}
