//! Auth extractors (spec.md §1, "the core consumes `{actor, role}`").
//! Session management, user databases, and password handling are explicit
//! Non-goals; these extractors only recognise the two bearer tokens the
//! core itself is configured with.

use super::state::AppState;
use crate::error::Error;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Runner,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub actor: String,
    pub role: Role,
}

impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(Error::Unauthorized)?;

        if token == state.config.runner_bearer_token && !token.is_empty() {
            return Ok(Auth {
                actor: "cron-runner".to_string(),
                role: Role::Runner,
            });
        }

        if token.is_empty() {
            return Err(Error::Unauthorized);
        }

        // Any other non-empty bearer token is accepted as an authenticated
        // user identity; the upstream gateway that issued it is out of
        // scope here.
        Ok(Auth {
            actor: token.to_string(),
            role: Role::User,
        })
    }
}

/// Extractor for the two ESP32 endpoints, keyed on `ESP32_API_KEY`
/// instead of a bearer token (spec.md §6).
pub struct Esp32Auth;

impl FromRequestParts<AppState> for Esp32Auth {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Api-Key")
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Unauthorized)?;

        if key != state.config.esp32_api_key || key.is_empty() {
            return Err(Error::Forbidden);
        }

        Ok(Esp32Auth)
    }
}
