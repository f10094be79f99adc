use reqwest::Client;
use url::Url;

use crate::{config::Config, error::Error, spotify::retry::RetryPolicy, types::TokenGrant};

use super::check_status;

/// Client for the Spotify accounts service (authorize + token endpoints).
///
/// Both token operations authenticate with HTTP basic client credentials and
/// send `application/x-www-form-urlencoded` bodies.
pub struct TokenClient {
    http: Client,
    auth_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    show_dialog: bool,
    retry: RetryPolicy,
}

impl TokenClient {
    pub fn new(config: &Config, http: Client) -> Self {
        Self {
            http,
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            show_dialog: config.development,
            retry: config.retry,
        }
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Builds the authorize URL the browser is redirected to.
    ///
    /// # Arguments
    ///
    /// * `state` - the single-use CSRF token, echoed back on the callback
    pub fn authorize_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("redirect_uri", self.redirect_uri.as_str())
                .append_pair("state", state);
            if self.show_dialog {
                query.append_pair("show_dialog", "true");
            }
        }
        url.into()
    }

    /// Exchanges an authorization code for an access/refresh token pair.
    ///
    /// Network errors and 5xx responses are retried per the [`RetryPolicy`].
    /// A 4xx (used or expired code, redirect URI mismatch, bad client
    /// credentials) fails immediately, since the code is single-use and a
    /// retry can never succeed.
    ///
    /// # Errors
    ///
    /// [`Error::UpstreamAuth`] carrying the upstream status and body.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &Url,
    ) -> Result<TokenGrant, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        self.request_grant("authorization code exchange", &params)
            .await
    }

    /// Mints a new access token from a refresh token.
    ///
    /// The response carries a new refresh token only when the upstream
    /// rotates it. Same failure semantics as
    /// [`exchange_authorization_code`](Self::exchange_authorization_code).
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, Error> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.request_grant("token refresh", &params).await
    }

    async fn request_grant(
        &self,
        operation: &'static str,
        params: &[(&str, &str)],
    ) -> Result<TokenGrant, Error> {
        let result = self
            .retry
            .run(operation, Error::is_transient, move || async move {
                let response = self
                    .http
                    .post(self.token_url.clone())
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(params)
                    .send()
                    .await
                    .map_err(Error::from_reqwest)?;

                let response = check_status(response).await?;
                response
                    .json::<TokenGrant>()
                    .await
                    .map_err(|e| Error::InvalidResponse(e.to_string()))
            })
            .await;

        result.map_err(|err| {
            let err = into_auth_error(err);
            if let Error::UpstreamAuth { status, body } = &err {
                tracing::warn!(
                    operation,
                    status = ?status,
                    body = %body,
                    "token endpoint rejected request"
                );
            }
            err
        })
    }
}

fn into_auth_error(err: Error) -> Error {
    match err {
        Error::UpstreamTransient { status, message } => Error::UpstreamAuth {
            status,
            body: message,
        },
        Error::Upstream { status, message } => Error::UpstreamAuth {
            status: Some(status),
            body: message,
        },
        Error::RateLimited { .. } => Error::UpstreamAuth {
            status: Some(429),
            body: "rate limited".into(),
        },
        Error::InvalidResponse(body) => Error::UpstreamAuth { status: None, body },
        other => other,
    }
}
