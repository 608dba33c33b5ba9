//! `CronAdapter` (spec.md §4.1): the only module allowed to touch the host's
//! scheduled-job table. Everything above it (`SchedulerService`) works in
//! terms of `CronEntry` values, never raw text.

mod adapter;

pub use adapter::{CronAdapter, CronBackend, CronEntry};
