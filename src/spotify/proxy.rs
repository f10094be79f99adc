use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::{
    config::Config,
    error::Error,
    management::{SessionGuard, SessionStore},
    spotify::{auth::TokenClient, check_status, retry::RetryPolicy},
};

/// Authenticated request proxy to the Spotify Web API.
///
/// Each call resolves the session, refreshes its access token when the
/// stored expiry has passed, attaches the bearer credential and performs
/// the request under the shared [`RetryPolicy`].
pub struct SpotifyApi {
    http: Client,
    api_url: Url,
    tokens: Arc<TokenClient>,
    store: Arc<dyn SessionStore>,
    retry: RetryPolicy,
}

impl SpotifyApi {
    pub fn new(
        config: &Config,
        http: Client,
        tokens: Arc<TokenClient>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            tokens,
            store,
            retry: config.retry,
        }
    }

    /// Performs `method path?query` on behalf of the session.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthenticated`] if the session does not exist
    /// - [`Error::SessionExpired`] if the token refresh failed; the session is gone
    /// - [`Error::RateLimited`], [`Error::Upstream`] for non-retryable upstream statuses
    /// - [`Error::UpstreamTransient`] once retries are exhausted
    ///
    /// A 401 is never retried: right after a refresh it points at a revoked
    /// grant, not a transient condition.
    pub async fn call(
        &self,
        session_id: &str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, Error> {
        let token = self.access_token(session_id).await?;
        let url = self.endpoint(path);

        self.retry
            .run(path, Error::is_transient, || {
                let request = self
                    .http
                    .request(method.clone(), url.clone())
                    .bearer_auth(&token)
                    .query(query);
                async move {
                    let response = request.send().await.map_err(Error::from_reqwest)?;
                    let response = check_status(response).await?;
                    if response.status() == StatusCode::NO_CONTENT {
                        return Ok(Value::Null);
                    }
                    let body = response.bytes().await.map_err(Error::from_reqwest)?;
                    if body.is_empty() {
                        return Ok(Value::Null);
                    }
                    serde_json::from_slice(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
                }
            })
            .await
            .inspect_err(|e| {
                if !e.is_auth_failure() {
                    tracing::warn!(path, error = %e, "Spotify request failed");
                }
            })
    }

    /// `GET` decoded into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        session_id: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let value = self.call(session_id, Method::GET, path, query).await?;
        serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{path}: {e}")))
    }

    /// Current access token for the session, refreshed first if expired.
    ///
    /// The expiry check, the refresh and the write-back all happen under the
    /// session lock, so concurrent requests for one session trigger at most
    /// one upstream refresh and never see a half-updated record.
    pub async fn access_token(&self, session_id: &str) -> Result<String, Error> {
        let mut record = self
            .store
            .lock(session_id)
            .await?
            .ok_or(Error::Unauthenticated)?;

        let now = Utc::now();
        if !record.is_expired(now) {
            return Ok(record.access_token.clone());
        }

        self.refresh_locked(session_id, &mut record, now).await?;
        Ok(record.access_token.clone())
    }

    /// Refreshes the session's access token regardless of its expiry.
    ///
    /// Returns the new expiry.
    pub async fn force_refresh(&self, session_id: &str) -> Result<Option<DateTime<Utc>>, Error> {
        let mut record = self
            .store
            .lock(session_id)
            .await?
            .ok_or(Error::Unauthenticated)?;

        self.refresh_locked(session_id, &mut record, Utc::now())
            .await?;
        Ok(record.expires_at)
    }

    async fn refresh_locked(
        &self,
        session_id: &str,
        record: &mut SessionGuard,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let refreshed = self
            .tokens
            .refresh_access_token(&record.refresh_token)
            .await;

        match refreshed {
            Ok(grant) => {
                record.apply_refresh(grant, now);
                tracing::debug!("session access token refreshed");
                Ok(())
            }
            Err(e) => {
                // Delete while still holding the guard so waiters see the
                // session gone instead of retrying the dead refresh token.
                self.store.delete(session_id).await?;
                tracing::info!(error = %e, "token refresh failed, session removed");
                Err(Error::SessionExpired)
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
