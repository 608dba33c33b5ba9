//! Event scheduler (spec.md §4.6): one-shot and recurring wall-clock jobs
//! materialised as cron entries.

mod job;
mod job_store;
mod service;

pub use job::{JobKind, ScheduledJob};
pub use service::SchedulerService;
