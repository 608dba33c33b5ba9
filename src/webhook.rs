//! `WebhookClient` (spec.md §4.4): fires named events at the outbound
//! webhook gateway with bounded retries. `stub` mode short-circuits the
//! network call for local development and tests, grounded in the same
//! live/stub split used across the core's outbound collaborators.

use crate::config::{AppConfig, ExternalApiMode};
use crate::error::{Result, WebhookError};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY_MS: u64 = 4_000;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct WebhookClient {
    mode: ExternalApiMode,
    base_url: String,
    key: Option<String>,
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mode: config.external_api_mode,
            base_url: config.api_base_url.clone(),
            key: config.webhook_key.clone(),
            http: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .expect("build webhook http client"),
        }
    }

    /// Fire `event_name` at the gateway. Retries up to `MAX_ATTEMPTS` times
    /// with exponential backoff, succeeding as soon as any attempt returns
    /// an HTTP 2xx.
    pub async fn trigger(&self, event_name: &str) -> Result<()> {
        if self.mode == ExternalApiMode::Stub {
            tracing::info!(event = event_name, "webhook dispatch (stub mode)");
            return Ok(());
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), event_name);
        let mut last_reason = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.http.post(&url);
            if let Some(key) = &self.key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(event = event_name, attempt, "webhook dispatch succeeded");
                    return Ok(());
                }
                Ok(response) => {
                    last_reason = format!("HTTP {}", response.status());
                    tracing::warn!(event = event_name, attempt, status = %response.status(), "webhook dispatch rejected");
                }
                Err(error) => {
                    last_reason = error.to_string();
                    tracing::warn!(event = event_name, attempt, error = %error, "webhook dispatch failed");
                }
            }

            if attempt < MAX_ATTEMPTS {
                let delay_ms = (RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1)).min(RETRY_MAX_DELAY_MS);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        Err(WebhookError::DispatchFailed {
            event: event_name.to_string(),
            attempts: MAX_ATTEMPTS,
            reason: last_reason,
        }
        .into())
    }

    /// A client pinned to `stub` mode, for tests that only care about call
    /// ordering and don't want to stand up an `AppConfig`.
    #[cfg(test)]
    pub fn new_stub() -> Self {
        Self {
            mode: ExternalApiMode::Stub,
            base_url: "http://stub.invalid".to_string(),
            key: None,
            http: reqwest::Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .expect("build webhook http client"),
        }
    }
}
