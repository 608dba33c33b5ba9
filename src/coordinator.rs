//! `HeatTargetCoordinator` (spec.md §4.10): the glue invoked when a
//! scheduled `heat_on` job fires.

use crate::equipment::EquipmentService;
use crate::error::Result;
use crate::heating::HeatingCycleEngine;
use crate::scheduler::{JobKind, SchedulerService};
use crate::settings::{ScheduleMode, SettingsStore};
use crate::temperature::fahrenheit_to_celsius;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub struct HeatTargetCoordinator {
    equipment: Arc<EquipmentService>,
    engine: Arc<HeatingCycleEngine>,
    settings: Arc<SettingsStore>,
    scheduler: Arc<SchedulerService>,
    heating_rate_f_per_min: f64,
}

impl HeatTargetCoordinator {
    pub fn new(
        equipment: Arc<EquipmentService>,
        engine: Arc<HeatingCycleEngine>,
        settings: Arc<SettingsStore>,
        scheduler: Arc<SchedulerService>,
        heating_rate_f_per_min: f64,
    ) -> Self {
        Self {
            equipment,
            engine,
            settings,
            scheduler,
            heating_rate_f_per_min,
        }
    }

    /// Invoked by the loopback `heat_on` handler (spec.md §4.10).
    pub async fn handle_heat_on(&self) -> Result<()> {
        let settings = self.settings.get();

        if !settings.enabled {
            self.equipment.heater_on().await?;
            return Ok(());
        }

        self.equipment.heater_on().await?;
        self.engine
            .start(fahrenheit_to_celsius(settings.target_temp_f), "heat-target-coordinator")
            .await?;
        Ok(())
    }

    /// Translate a `ready_by` request into a `heat_on` one-shot scheduled
    /// to start early enough to finish by `ready_by_local`, using the
    /// configured heating-rate constant (spec.md §4.10).
    pub fn schedule_ready_by(
        &self,
        ready_by_local: DateTime<Tz>,
        current_temp_f: f64,
        owner: &str,
    ) -> Result<crate::scheduler::ScheduledJob> {
        let settings = self.settings.get();
        let delta_f = (settings.target_temp_f - current_temp_f).max(0.0);
        let estimated_minutes = if self.heating_rate_f_per_min > 0.0 {
            delta_f / self.heating_rate_f_per_min
        } else {
            0.0
        };

        let start_at = ready_by_local.with_timezone(&Utc)
            - chrono::Duration::seconds((estimated_minutes * 60.0) as i64);

        self.scheduler.schedule_one_shot(
            JobKind::HeatOn,
            start_at,
            owner,
            serde_json::json!({ "schedule_mode": "ready_by" }),
        )
    }

    pub fn settings_schedule_mode(&self) -> ScheduleMode {
        self.settings.get().schedule_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageLayout;
    use crate::cron::{CronAdapter, CronBackend};
    use crate::equipment::EquipmentStatusStore;
    use crate::heating::CycleStore;
    use crate::scheduler::SchedulerService;
    use crate::settings::HeatTargetSettings;
    use crate::temperature::PushTemperatureProvider;
    use crate::time::TimeService;
    use crate::webhook::WebhookClient;
    use std::sync::Arc;

    fn coordinator(dir: &std::path::Path, enabled: bool) -> HeatTargetCoordinator {
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
        let engine = Arc::new(HeatingCycleEngine::new(
            CycleStore::new(storage.clone()),
            push.clone(),
            Some(push),
            equipment.clone(),
            scheduler.clone(),
            WebhookClient::new_stub(),
        ));

        let settings_store = SettingsStore::load(&storage).unwrap();
        settings_store
            .set(HeatTargetSettings {
                enabled,
                target_temp_f: 102.0,
                ..HeatTargetSettings::default()
            })
            .unwrap();

        HeatTargetCoordinator::new(equipment, engine, Arc::new(settings_store), scheduler, 0.5)
    }

    #[tokio::test]
    async fn handle_heat_on_with_settings_disabled_only_turns_heater_on() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), false);
        coordinator.handle_heat_on().await.unwrap();
        assert!(coordinator.equipment.status().unwrap().heater.on);
    }

    #[tokio::test]
    async fn handle_heat_on_with_settings_enabled_also_starts_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), true);
        coordinator.handle_heat_on().await.unwrap();
        assert!(coordinator.equipment.status().unwrap().heater.on);
        // A monitor-tick one-shot should now be pending for the started cycle.
        assert!(coordinator
            .scheduler
            .list()
            .unwrap()
            .iter()
            .any(|job| job.kind == JobKind::MonitorTick));
    }

    #[test]
    fn schedule_ready_by_starts_early_by_the_configured_heating_rate() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path(), true);
        let ready_by = Utc::now().with_timezone(&chrono_tz::UTC) + chrono::Duration::hours(1);
        let job = coordinator
            .schedule_ready_by(ready_by, 92.0, "test")
            .unwrap();
        // 10°F to climb at 0.5°F/min is 20 minutes; start time should be
        // roughly 20 minutes before ready_by.
        let lead = ready_by.with_timezone(&Utc) - job.scheduled_time;
        assert!((lead.num_seconds() - 1200).abs() < 5);
    }
}
