//! Configuration loading and validation.
//!
//! Everything the core needs is folded into one `AppConfig` record, loaded
//! once at startup and threaded through every constructor — no global
//! mutable config singleton (spec.md §9, "Global mutable state").

use crate::error::{ConfigError, Result};
use std::path::PathBuf;

/// Selects whether outbound collaborators (webhook gateway, sensor cloud)
/// are hit for real or short-circuited for local development/tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalApiMode {
    Live,
    #[default]
    Stub,
}

impl ExternalApiMode {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "live" => Ok(Self::Live),
            "stub" => Ok(Self::Stub),
            other => Err(ConfigError::Invalid(format!(
                "EXTERNAL_API_MODE must be 'live' or 'stub', got '{other}'"
            ))
            .into()),
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Paths into the `storage/` tree described in spec.md §6.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub root: PathBuf,
}

impl StorageLayout {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the storage root the same way for the server and the
    /// standalone `cron-runner` binary: `HOTTUB_STORAGE_DIR` if set,
    /// otherwise the platform data directory.
    pub fn discover() -> Result<Self> {
        let root = std::env::var("HOTTUB_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .map(|d| d.join("hottub-core").join("storage"))
                    .unwrap_or_else(|| PathBuf::from("./storage"))
            });
        let layout = Self::new(root);
        layout.ensure_tree().map_err(|error| {
            ConfigError::Invalid(format!(
                "failed to create storage tree at {}: {error}",
                layout.root.display()
            ))
        })?;
        Ok(layout)
    }

    pub fn scheduled_jobs_dir(&self) -> PathBuf {
        self.root.join("scheduled-jobs")
    }

    pub fn job_file(&self, job_id: &str) -> PathBuf {
        self.scheduled_jobs_dir().join(format!("job-{job_id}.json"))
    }

    pub fn heating_cycles_dir(&self) -> PathBuf {
        self.root.join("heating-cycles")
    }

    pub fn cycle_file(&self, cycle_id: &str) -> PathBuf {
        self.heating_cycles_dir().join(format!("cycle-{cycle_id}.json"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn esp32_temperature_file(&self) -> PathBuf {
        self.state_dir().join("esp32-temperature.json")
    }

    pub fn equipment_status_file(&self) -> PathBuf {
        self.state_dir().join("equipment-status.json")
    }

    pub fn heat_target_settings_file(&self) -> PathBuf {
        self.state_dir().join("heat-target-settings.json")
    }

    pub fn firmware_dir(&self) -> PathBuf {
        self.root.join("firmware")
    }

    pub fn firmware_config_file(&self) -> PathBuf {
        self.firmware_dir().join("config.json")
    }

    pub fn crontab_backups_dir(&self) -> PathBuf {
        self.root.join("crontab-backups")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn cron_runner_path(&self) -> PathBuf {
        self.bin_dir().join("cron-runner")
    }

    /// Protected file holding the runner bearer token, kept out of the cron
    /// table itself (spec.md §4.6, "Cron entries carry no secrets").
    pub fn runner_env_file(&self) -> PathBuf {
        self.root.join("runner.env")
    }

    /// Flat-file stand-in for the host crontab, and its lock sentinel.
    /// In `live` mode on a real host, `CronAdapter` instead shells out to
    /// `crontab`; this path backs the lock file either way.
    pub fn crontab_lock_file(&self) -> PathBuf {
        self.root.join("crontab.lock")
    }

    pub fn crontab_flat_file(&self) -> PathBuf {
        self.root.join("crontab.txt")
    }

    /// Build a layout rooted at `root` for tests, creating its directory
    /// tree eagerly so adapters can write into it immediately. Not gated by
    /// `#[cfg(test)]`: the crate's `tests/` integration binaries link
    /// against a normal (non-test) build of this library and need it too.
    pub fn new_for_test(root: PathBuf) -> Self {
        let layout = Self::new(root);
        layout.ensure_tree().expect("create test storage tree");
        layout
    }

    fn ensure_tree(&self) -> std::io::Result<()> {
        for dir in [
            self.scheduled_jobs_dir(),
            self.heating_cycles_dir(),
            self.state_dir(),
            self.firmware_dir(),
            self.crontab_backups_dir(),
            self.logs_dir(),
            self.bin_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Application-wide configuration, loaded once from the environment
/// (spec.md §6, "Configuration (env)").
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub external_api_mode: ExternalApiMode,
    pub webhook_key: Option<String>,
    pub sensor_oauth_token: Option<String>,
    pub sensor_device_id: Option<String>,
    pub runner_bearer_token: String,
    pub api_base_url: String,
    pub esp32_api_key: String,
    pub storage: StorageLayout,
    pub bind_addr: std::net::SocketAddr,
    /// Whether `heater.on => pump.on` is enforced (spec.md §3,
    /// "the operator explicitly decoupled them (by config)").
    pub couple_heater_to_pump: bool,
    /// °F/min used to translate `ready_by` schedule mode into a start
    /// time (spec.md §4.10), default 0.5.
    pub heating_rate_f_per_min: f64,
    /// Opaque passthrough reported in `GET /api/health` (spec.md §6,
    /// `blindsEnabled`). Belongs to an out-of-scope collaborator; the core
    /// never acts on it, only reports whatever the operator configured.
    pub blinds_enabled: bool,
}

impl AppConfig {
    /// Load configuration from the environment, validating it eagerly.
    ///
    /// In `live` mode, secrets required to actually reach the webhook
    /// gateway and sensor cloud must be present. In `stub` mode they are
    /// optional so the core runs fully offline for development and tests.
    pub fn load() -> Result<Self> {
        let external_api_mode = ExternalApiMode::parse(
            &std::env::var("EXTERNAL_API_MODE").unwrap_or_else(|_| "stub".to_string()),
        )?;

        let webhook_key = std::env::var("WEBHOOK_KEY").ok();
        let sensor_oauth_token = std::env::var("SENSOR_OAUTH_TOKEN").ok();
        let sensor_device_id = std::env::var("SENSOR_DEVICE_ID").ok();
        let runner_bearer_token = std::env::var("RUNNER_BEARER_TOKEN").unwrap_or_default();
        let api_base_url =
            std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let esp32_api_key = std::env::var("ESP32_API_KEY").unwrap_or_default();

        if external_api_mode.is_live() {
            if webhook_key.is_none() {
                return Err(ConfigError::MissingKey("WEBHOOK_KEY".into()).into());
            }
            if sensor_oauth_token.is_none() {
                return Err(ConfigError::MissingKey("SENSOR_OAUTH_TOKEN".into()).into());
            }
            if sensor_device_id.is_none() {
                return Err(ConfigError::MissingKey("SENSOR_DEVICE_ID".into()).into());
            }
            if runner_bearer_token.is_empty() {
                return Err(ConfigError::MissingKey("RUNNER_BEARER_TOKEN".into()).into());
            }
            if esp32_api_key.is_empty() {
                return Err(ConfigError::MissingKey("ESP32_API_KEY".into()).into());
            }
        }

        let storage = StorageLayout::discover()?;

        if !runner_bearer_token.is_empty() {
            write_runner_env_file(
                &storage.runner_env_file(),
                &runner_bearer_token,
                &api_base_url,
                external_api_mode,
            )
            .map_err(|error| ConfigError::Invalid(format!("failed to write runner env file: {error}")))?;
        }

        let bind_addr: std::net::SocketAddr = std::env::var("HOTTUB_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .map_err(|error| {
                ConfigError::Invalid(format!("invalid HOTTUB_BIND_ADDR: {error}"))
            })?;

        let couple_heater_to_pump = std::env::var("HOTTUB_COUPLE_PUMP")
            .map(|value| value != "false" && value != "0")
            .unwrap_or(true);

        let heating_rate_f_per_min = std::env::var("HOTTUB_HEATING_RATE_F_PER_MIN")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.5);

        let blinds_enabled = std::env::var("HOTTUB_BLINDS_ENABLED")
            .map(|value| value != "false" && value != "0")
            .unwrap_or(true);

        Ok(Self {
            external_api_mode,
            webhook_key,
            sensor_oauth_token,
            sensor_device_id,
            runner_bearer_token,
            api_base_url,
            esp32_api_key,
            storage,
            bind_addr,
            couple_heater_to_pump,
            heating_rate_f_per_min,
            blinds_enabled,
        })
    }
}

/// The runner reads its bearer token and base URL back out of this file
/// rather than the cron table or its own (minimal, host-controlled)
/// environment.
fn write_runner_env_file(
    path: &std::path::Path,
    token: &str,
    api_base_url: &str,
    external_api_mode: ExternalApiMode,
) -> std::io::Result<()> {
    let mode = if external_api_mode.is_live() { "live" } else { "stub" };
    let temp_path = path.with_extension("tmp");
    std::fs::write(
        &temp_path,
        format!("RUNNER_BEARER_TOKEN={token}\nAPI_BASE_URL={api_base_url}\nEXTERNAL_API_MODE={mode}\n"),
    )?;
    std::fs::rename(&temp_path, path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)?;
    }

    Ok(())
}

/// What the runner reads back out of the protected env file written by
/// `AppConfig::load` (spec.md §4.7 step 2): its bearer token, the API base
/// URL, and which cron backend the server used to write its own entry.
pub struct RunnerEnv {
    pub bearer_token: String,
    pub api_base_url: String,
    pub external_api_mode: ExternalApiMode,
}

pub fn read_runner_env_file(path: &std::path::Path) -> Result<RunnerEnv> {
    let contents = std::fs::read_to_string(path)
        .map_err(|error| ConfigError::Invalid(format!("cannot read runner env file: {error}")))?;

    let mut bearer_token = None;
    let mut api_base_url = None;
    let mut external_api_mode = ExternalApiMode::Stub;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("RUNNER_BEARER_TOKEN=") {
            bearer_token = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("API_BASE_URL=") {
            api_base_url = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("EXTERNAL_API_MODE=") {
            external_api_mode = ExternalApiMode::parse(value).unwrap_or(ExternalApiMode::Stub);
        }
    }

    let bearer_token =
        bearer_token.ok_or_else(|| ConfigError::Invalid("runner env file missing RUNNER_BEARER_TOKEN".into()))?;
    let api_base_url =
        api_base_url.ok_or_else(|| ConfigError::Invalid("runner env file missing API_BASE_URL".into()))?;
    Ok(RunnerEnv {
        bearer_token,
        api_base_url,
        external_api_mode,
    })
}
