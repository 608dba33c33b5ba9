//! `HeatingCycleEngine` (spec.md §4.9): a sequence of short ticks, each
//! ending by scheduling its own next wake as a `monitor_tick` job. Never a
//! long-running in-memory loop — the host may terminate processes between
//! ticks.

use super::cycle::{CycleStatus, HeatingCycle};
use super::cycle_store::CycleStore;
use crate::equipment::EquipmentService;
use crate::error::{Result, SchedulerError};
use crate::scheduler::{JobKind, SchedulerService};
use crate::temperature::{celsius_to_fahrenheit, PushTemperatureProvider, TemperatureProvider};
use crate::webhook::WebhookClient;
use chrono::Utc;
use std::sync::Arc;

/// Added to the target when it exceeds `HIGH_THRESHOLD_F`, to damp
/// micro-oscillation near the top of the comfortable range.
const BUFFER_HIGH_F: f64 = 0.5;
const HIGH_THRESHOLD_F: f64 = 102.0;
const MAX_INVALID_READS: u32 = 3;
const SAFETY_MAX_ITERATIONS: u32 = 20;
const SAFETY_MAX_ITERATIONS_PRECISION: u32 = 40;
const FIRST_TICK_DELAY_SECONDS: i64 = 60;

fn cadence_seconds(delta_f: f64) -> (i64, bool) {
    if delta_f > 10.0 {
        (19 * 60 + 45, false)
    } else if delta_f > 5.0 {
        (9 * 60 + 45, false)
    } else if delta_f >= 1.0 {
        (105, false)
    } else {
        (15, true)
    }
}

pub struct HeatingCycleEngine {
    cycles: CycleStore,
    provider: Arc<dyn TemperatureProvider>,
    push_provider: Option<Arc<PushTemperatureProvider>>,
    equipment: Arc<EquipmentService>,
    scheduler: Arc<SchedulerService>,
    webhook: WebhookClient,
}

impl HeatingCycleEngine {
    pub fn new(
        cycles: CycleStore,
        provider: Arc<dyn TemperatureProvider>,
        push_provider: Option<Arc<PushTemperatureProvider>>,
        equipment: Arc<EquipmentService>,
        scheduler: Arc<SchedulerService>,
        webhook: WebhookClient,
    ) -> Self {
        Self {
            cycles,
            provider,
            push_provider,
            equipment,
            scheduler,
            webhook,
        }
    }

    /// Create a new `heating` cycle and schedule its first tick one minute
    /// out (spec.md §4.10). Returns the persisted cycle.
    pub async fn start(&self, target_temp_c: f64, owner: &str) -> Result<HeatingCycle> {
        if let Some(existing) = self.cycles.active()? {
            return Err(SchedulerError::OverlappingSchedule(format!(
                "cycle {} is already heating (spec.md §3: at most one active cycle)",
                existing.cycle_id
            ))
            .into());
        }

        let cycle_id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
        let cycle = HeatingCycle::new(cycle_id.clone(), target_temp_c, Utc::now());
        self.cycles.save(&cycle)?;

        self.scheduler.schedule_one_shot(
            JobKind::MonitorTick,
            Utc::now() + chrono::Duration::seconds(FIRST_TICK_DELAY_SECONDS),
            owner,
            serde_json::json!({ "cycle_id": cycle_id }),
        )?;

        Ok(cycle)
    }

    /// Advance one cycle by one tick (spec.md §4.9). No-ops silently if the
    /// cycle is not in `heating` status, to guard against a stray
    /// double-fire.
    pub async fn tick(&self, cycle_id: &str) -> Result<()> {
        let mut cycle = self.cycles.get(cycle_id)?;
        if cycle.status != CycleStatus::Heating {
            return Ok(());
        }

        if cycle.precision_mode {
            if let Some(push) = &self.push_provider {
                push.request_precision(true);
            }
        }

        let reading = match self.provider.read_fresh().await {
            Ok(reading) => reading,
            Err(_) => {
                cycle.invalid_read_count += 1;
                if cycle.invalid_read_count > MAX_INVALID_READS {
                    return self.fail_safety(cycle, "repeated invalid readings exceeded threshold").await;
                }
                cycle.last_check = Utc::now();
                self.cycles.save(&cycle)?;
                let retry_interval = if cycle.precision_mode { 15 } else { 105 };
                return self.reschedule(&cycle, retry_interval).await;
            }
        };

        cycle.invalid_read_count = 0;
        let current_f = reading.water_temp_f().expect("validated reading carries water_temp_c");
        cycle.current_temp_c = reading.water_temp_c;
        cycle.last_check = Utc::now();

        let target_f = celsius_to_fahrenheit(cycle.target_temp_c);
        let adjusted_target_f = if target_f > HIGH_THRESHOLD_F {
            target_f + BUFFER_HIGH_F
        } else {
            target_f
        };
        let delta_f = adjusted_target_f - current_f;

        if delta_f <= 0.0 {
            self.equipment.heater_off().await?;
            cycle.status = CycleStatus::Completed;
            self.cycles.save(&cycle)?;
            if let Some(push) = &self.push_provider {
                push.request_precision(false);
            }
            self.notify(&format!("ready at {current_f:.1}°F")).await;
            return Ok(());
        }

        let (interval_seconds, precision_mode) = cadence_seconds(delta_f);
        cycle.precision_mode = precision_mode;
        if let Some(push) = &self.push_provider {
            push.request_precision(precision_mode);
        }

        cycle.safety_counter += 1;
        let safety_max = if precision_mode {
            SAFETY_MAX_ITERATIONS_PRECISION
        } else {
            SAFETY_MAX_ITERATIONS
        };
        if cycle.safety_counter > safety_max {
            return self.fail_safety(cycle, "safety counter exceeded maximum iterations").await;
        }

        cycle.estimated_completion =
            Some(Utc::now() + chrono::Duration::seconds(estimate_remaining_seconds(delta_f)));
        self.cycles.save(&cycle)?;
        self.reschedule(&cycle, interval_seconds).await
    }

    async fn fail_safety(&self, mut cycle: HeatingCycle, reason: &str) -> Result<()> {
        self.equipment.heater_off().await?;
        cycle.status = CycleStatus::Error;
        self.cycles.save(&cycle)?;
        if let Some(push) = &self.push_provider {
            push.request_precision(false);
        }
        tracing::warn!(cycle_id = %cycle.cycle_id, reason, "heating cycle forced into error");
        self.notify(&format!("heating cycle {} stopped: {reason}", cycle.cycle_id))
            .await;
        Ok(())
    }

    async fn reschedule(&self, cycle: &HeatingCycle, interval_seconds: i64) -> Result<()> {
        self.scheduler.schedule_tick(
            &cycle.cycle_id,
            Utc::now() + chrono::Duration::seconds(interval_seconds),
            "heating-cycle-engine",
        )?;
        Ok(())
    }

    async fn notify(&self, message: &str) {
        tracing::info!(message, "heating cycle notification");
        if let Err(error) = self.webhook.trigger("heating_cycle_notification").await {
            tracing::warn!(error = %error, "failed to dispatch heating cycle notification");
        }
    }
}

fn estimate_remaining_seconds(delta_f: f64) -> i64 {
    // 0.5 °F/min default heating rate, expressed in seconds per degree.
    (delta_f * 120.0).max(0.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageLayout;
    use crate::cron::{CronAdapter, CronBackend};
    use crate::equipment::{EquipmentService, EquipmentStatusStore};
    use crate::scheduler::SchedulerService;
    use crate::temperature::PushTemperatureProvider;
    use crate::time::TimeService;
    use crate::webhook::WebhookClient;

    #[test]
    fn cadence_buckets_match_the_spec_table() {
        assert_eq!(cadence_seconds(10.5), (19 * 60 + 45, false));
        assert_eq!(cadence_seconds(7.0), (9 * 60 + 45, false));
        assert_eq!(cadence_seconds(1.0), (105, false));
        assert_eq!(cadence_seconds(0.999), (15, true));
    }

    #[test]
    fn cadence_bucket_boundaries_are_inclusive_on_the_lower_edge() {
        // Exactly at a boundary falls into the bucket below it, not above.
        assert_eq!(cadence_seconds(10.0), (9 * 60 + 45, false));
        assert_eq!(cadence_seconds(5.0), (105, false));
    }

    fn engine(dir: &std::path::Path) -> HeatingCycleEngine {
        let storage = StorageLayout::new_for_test(dir.to_path_buf());
        let cron = CronAdapter::new(CronBackend::File, &storage);
        let time = TimeService::with_timezone(chrono_tz::UTC);
        let scheduler = Arc::new(SchedulerService::new(cron, time, storage.clone()));
        let equipment = Arc::new(EquipmentService::new(
            EquipmentStatusStore::new(&storage),
            WebhookClient::new_stub(),
            true,
        ));
        let push = Arc::new(PushTemperatureProvider::new(&storage));
        HeatingCycleEngine::new(
            CycleStore::new(storage),
            push.clone(),
            Some(push),
            equipment,
            scheduler,
            WebhookClient::new_stub(),
        )
    }

    #[tokio::test]
    async fn start_rejects_a_second_cycle_while_one_is_already_heating() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.start(40.0, "test").await.unwrap();
        let second = engine.start(41.0, "test").await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn start_permits_a_new_cycle_once_the_prior_one_completed() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let first = engine.start(40.0, "test").await.unwrap();
        let mut completed = first.clone();
        completed.status = CycleStatus::Completed;
        engine.cycles.save(&completed).unwrap();
        assert!(engine.start(41.0, "test").await.is_ok());
    }
}
