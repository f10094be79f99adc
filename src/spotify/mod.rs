//! # Spotify Integration Module
//!
//! The integration layer between the HTTP routes and Spotify's two services:
//! the accounts service (authorize and token endpoints) and the Web API.
//!
//! ## Architecture
//!
//! ```text
//! Route Layer (api)
//!          ↓
//! Aggregation (summary)      ── fan-out / fan-in, derived statistics
//!          ↓
//! Authenticated Proxy (proxy) ── session lookup, refresh, bearer, retry
//!          ↓                ↘
//! Token Client (auth)        Session Store (management)
//!          ↓
//! HTTP Layer (reqwest, one shared client with a timeout)
//! ```
//!
//! ## Core Modules
//!
//! - [`auth`] - authorize URL construction, authorization-code exchange and
//!   token refresh, authenticated with client credentials
//! - [`proxy`] - [`SpotifyApi`](proxy::SpotifyApi), which turns a session id
//!   into an authenticated Web API call and refreshes expired tokens under
//!   the session lock
//! - [`summary`] - the vibe summary aggregation
//! - [`retry`] - the single retry-with-backoff utility used by every
//!   outbound call
//!
//! ## Error Handling
//!
//! Every response goes through [`check_status`], which sorts upstream
//! failures into the crate [`Error`] taxonomy:
//!
//! - **429** → [`Error::RateLimited`] with the `Retry-After` hint, not retried
//! - **5xx** and network failures → [`Error::UpstreamTransient`], retried
//! - anything else → [`Error::Upstream`] with Spotify's own message
//!
//! The token client then folds its failures into [`Error::UpstreamAuth`].

pub mod auth;
pub mod proxy;
pub mod retry;
pub mod summary;

use reqwest::{Response, StatusCode, header::RETRY_AFTER};
use serde_json::Value;

use crate::error::Error;

/// Returns the response if it is a success, otherwise the classified error.
pub(crate) async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        return Err(Error::RateLimited { retry_after_secs });
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(Error::UpstreamTransient {
            status: Some(status.as_u16()),
            message: body,
        });
    }

    Err(Error::Upstream {
        status: status.as_u16(),
        message: upstream_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("upstream request failed")
                .to_string()
        }),
    })
}

/// Extracts the human-readable message from a Spotify error body.
///
/// The Web API answers `{"error": {"status": 404, "message": "..."}}`, the
/// accounts service `{"error": "invalid_grant", "error_description": "..."}`.
fn upstream_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let error = json.get("error")?;

    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    let code = error.as_str()?;
    match json.get("error_description").and_then(Value::as_str) {
        Some(desc) => Some(format!("{code}: {desc}")),
        None => Some(code.to_string()),
    }
}
