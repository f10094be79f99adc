//! Error taxonomy shared by the token client, the proxy, and the route layer.
//!
//! Every upstream or network failure is normalized into [`Error`] at the
//! proxy boundary. Route handlers return `Result<_, Error>` and rely on
//! [`IntoResponse`] to turn the variant into a status code and a JSON
//! `{"error": message}` body.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid configuration at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// OAuth `state` did not match the signed state cookie.
    #[error("state mismatch")]
    CsrfMismatch,

    /// The accounts service rejected a code exchange or refresh.
    #[error("Spotify rejected the credentials, please reconnect")]
    UpstreamAuth { status: Option<u16>, body: String },

    /// No valid session cookie.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The session could not be refreshed and was removed.
    #[error("Session expired, please reconnect")]
    SessionExpired,

    /// Network failure, timeout, or 5xx from upstream.
    #[error("Spotify is temporarily unavailable")]
    UpstreamTransient { status: Option<u16>, message: String },

    /// 429 from upstream.
    #[error("Spotify rate limit reached")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success upstream status, passed through verbatim.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    BadRequest(String),

    /// Upstream answered 2xx with a body we could not decode.
    #[error("unexpected response from Spotify: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a retry may succeed: network errors, timeouts and 5xx.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamTransient { .. })
    }

    /// Whether the failure means the session is no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated
                | Self::SessionExpired
                | Self::UpstreamAuth { .. }
                | Self::Upstream { status: 401, .. }
        )
    }

    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::CsrfMismatch => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::SessionExpired | Self::UpstreamAuth { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamTransient {
                status: Some(503), ..
            } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTransient { .. } | Self::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        Self::UpstreamTransient {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let message = match &self {
            Self::Config(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Self::RateLimited {
            retry_after_secs: Some(secs),
        } = self
        {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
