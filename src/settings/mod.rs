//! User-controlled heat-target settings (spec.md §3), shared process-wide.

mod store;

pub use store::{HeatTargetSettings, ScheduleMode, SettingsStore};
