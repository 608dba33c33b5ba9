//! Structured logging setup: console output plus the three named daily
//! rolling log files from the storage layout (spec.md §6):
//! `logs/cron.log`, `logs/esp32.log`, `logs/temperature-YYYY-MM-DD.log`.

use crate::config::StorageLayout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Guards that must be held for the process lifetime to keep the
/// non-blocking file writers flushing.
pub struct TelemetryGuards(Vec<WorkerGuard>);

/// Initialize the global `tracing` subscriber for the server process.
///
/// Respects `RUST_LOG` for the console layer; each named log file gets its
/// own non-blocking writer filtered to the span target matching its name
/// (`cron`, `esp32`, `temperature`) so unrelated modules don't pollute it.
pub fn init(storage: &StorageLayout) -> anyhow::Result<TelemetryGuards> {
    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    let (cron_writer, cron_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(storage.logs_dir(), "cron.log"),
    );
    let cron_layer = tracing_subscriber::fmt::layer()
        .with_writer(cron_writer)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().starts_with("hottub_core::cron")
                || metadata.target().starts_with("hottub_core::scheduler")
        }));

    let (esp32_writer, esp32_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(storage.logs_dir(), "esp32.log"),
    );
    let esp32_layer = tracing_subscriber::fmt::layer()
        .with_writer(esp32_writer)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().contains("esp32") || metadata.target().contains("push")
        }));

    let (temperature_writer, temperature_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(storage.logs_dir(), "temperature"),
    );
    let temperature_layer = tracing_subscriber::fmt::layer()
        .with_writer(temperature_writer)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().starts_with("hottub_core::temperature")
                || metadata.target().starts_with("hottub_core::heating")
        }));

    tracing_subscriber::registry()
        .with(console_filter)
        .with(console_layer)
        .with(cron_layer)
        .with(esp32_layer)
        .with(temperature_layer)
        .try_init()?;

    Ok(TelemetryGuards(vec![cron_guard, esp32_guard, temperature_guard]))
}

/// Minimal initializer for the short-lived `cron-runner` binary: console
/// output plus an append to `logs/cron.log`, matching step 6 of the
/// runner's contract in spec.md §4.7 ("append a structured line to the
/// runner log").
pub fn init_runner(storage: &StorageLayout) -> anyhow::Result<TelemetryGuards> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (cron_writer, cron_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(storage.logs_dir(), "cron.log"),
    );
    let cron_layer = tracing_subscriber::fmt::layer()
        .with_writer(cron_writer)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(cron_layer)
        .try_init()?;

    Ok(TelemetryGuards(vec![cron_guard]))
}
