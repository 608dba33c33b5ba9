//! `cron-runner` (spec.md §4.7): launched by the host job runner with a
//! single argument, `job_id`. Step order is contractual:
//!
//! 1. Self-remove the cron entry first (one-shots only).
//! 2. Read the bearer token from the protected env file.
//! 3. Read the job file for the loopback endpoint.
//! 4. POST to `<api_base><endpoint>`, bounded timeout, no retry on 4xx,
//!    single retry on 5xx/network.
//! 5. Delete the job file (one-shots only).
//! 6. Append a structured line to the runner log.
//! 7. Exit with a status reflecting HTTP 2xx vs. anything else.

use hottub_core::config::{read_runner_env_file, StorageLayout};
use hottub_core::cron::{CronAdapter, CronBackend};
use std::time::Duration;

const LOOPBACK_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(success) => {
            if success {
                0
            } else {
                1
            }
        }
        Err(error) => {
            eprintln!("cron-runner failed: {error}");
            2
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> anyhow::Result<bool> {
    let job_id = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: cron-runner <job_id>"))?;

    let storage = StorageLayout::discover()?;
    let _telemetry_guards = hottub_core::telemetry::init_runner(&storage)?;

    let job_path = storage.job_file(&job_id);
    let job: hottub_core::scheduler::ScheduledJob = {
        let contents = std::fs::read_to_string(&job_path)?;
        serde_json::from_str(&contents)?
    };

    let env = run_env(&storage)?;

    // Step 1: self-removal first, before any other work, so a crash here
    // cannot leave a repeating ghost trigger.
    if !job.recurring {
        let backend = if env.external_api_mode.is_live() {
            CronBackend::Live
        } else {
            CronBackend::File
        };
        let cron = CronAdapter::new(backend, &storage);
        cron.remove_matching(&format!("HOTTUB:{job_id}"))?;
    }

    // Steps 2-3: bearer token and loopback endpoint are already in hand.
    let url = format!("{}{}", env.api_base_url.trim_end_matches('/'), job.endpoint);

    // Step 4: bounded, single-retry POST.
    let http = reqwest::Client::builder().timeout(LOOPBACK_TIMEOUT).build()?;
    let success = post_with_single_retry(&http, &url, &env.bearer_token).await;

    // Step 5: clean up the job file for one-shots regardless of outcome.
    if !job.recurring {
        match std::fs::remove_file(&job_path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
    }

    // Step 6: structured log line.
    tracing::info!(job_id = %job_id, endpoint = %job.endpoint, success, "cron-runner fired");

    // Step 7: exit status reflects the loopback outcome.
    Ok(success)
}

fn run_env(storage: &StorageLayout) -> anyhow::Result<hottub_core::config::RunnerEnv> {
    Ok(read_runner_env_file(&storage.runner_env_file())?)
}

async fn post_with_single_retry(http: &reqwest::Client, url: &str, bearer_token: &str) -> bool {
    for attempt in 1..=2 {
        let result = http.post(url).bearer_auth(bearer_token).send().await;
        match result {
            Ok(response) if response.status().is_success() => return true,
            Ok(response) if response.status().is_client_error() => {
                tracing::warn!(status = %response.status(), "loopback call rejected, not retrying");
                return false;
            }
            Ok(response) => {
                tracing::warn!(attempt, status = %response.status(), "loopback call failed");
            }
            Err(error) => {
                tracing::warn!(attempt, error = %error, "loopback call errored");
            }
        }
    }
    false
}
