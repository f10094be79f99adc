#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{SignedCookieJar, cookie::Cookie};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use vibeify::{
    api::cookies::SESSION_COOKIE,
    config::Config,
    server::{AppState, build_router},
    types::SessionRecord,
};

pub const FRONTEND: &str = "http://127.0.0.1:3000";

/// Configuration pointing every Spotify URL at the mock server.
pub fn test_config(server: &MockServer, extra: &[(&str, &str)]) -> Config {
    let uri = server.uri();
    let mut vars: HashMap<String, String> = [
        ("SPOTIFY_CLIENT_ID", "test-client".to_string()),
        ("SPOTIFY_CLIENT_SECRET", "test-secret".to_string()),
        ("SESSION_SECRET", "integration-test-secret".to_string()),
        ("SPOTIFY_API_AUTH_URL", format!("{uri}/authorize")),
        ("SPOTIFY_API_TOKEN_URL", format!("{uri}/api/token")),
        ("SPOTIFY_API_URL", format!("{uri}/v1")),
        ("FRONTEND_URI", FRONTEND.to_string()),
        ("RETRY_BASE_DELAY_MS", "5".to_string()),
        ("UPSTREAM_TIMEOUT_SECS", "5".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new(server: &MockServer) -> Self {
        Self::with_env(server, &[])
    }

    pub fn with_env(server: &MockServer, extra: &[(&str, &str)]) -> Self {
        let state = AppState::new(test_config(server, extra)).unwrap();
        let router = build_router(state.clone()).unwrap();
        Self { state, router }
    }

    /// Stores a session directly, bypassing the OAuth flow.
    pub async fn session(&self, expires_at: Option<DateTime<Utc>>) -> String {
        self.state
            .store
            .create(SessionRecord {
                access_token: "access-1".into(),
                refresh_token: "refresh-1".into(),
                expires_at,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    pub async fn live_session(&self) -> String {
        self.session(Some(Utc::now() + Duration::hours(1))).await
    }

    /// `name=value` with the value signed by the app's cookie key.
    pub fn signed_cookie(&self, name: &'static str, value: &str) -> String {
        let jar = SignedCookieJar::new(self.state.config.cookie_key.clone())
            .add(Cookie::new(name, value.to_string()));
        let response = jar.into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    pub fn session_cookie(&self, session_id: &str) -> String {
        self.signed_cookie(SESSION_COOKIE, session_id)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(Method::GET, uri, cookie).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(Method::POST, uri, cookie).await
    }

    async fn send(&self, method: Method, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every `Set-Cookie` header, unparsed.
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect()
}

/// The `Set-Cookie` header that assigns a non-empty value to `name`.
pub fn assigned_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(headers).into_iter().find(|c| {
        c.strip_prefix(&prefix)
            .is_some_and(|rest| !rest.starts_with(';') && !rest.is_empty())
    })
}

/// Whether the response tells the browser to drop `name`.
pub fn clears_cookie(headers: &HeaderMap, name: &str) -> bool {
    let prefix = format!("{name}=");
    set_cookies(headers)
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// 200 token response body.
pub fn grant(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "scope": "user-top-read",
        "expires_in": 3600,
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = Value::String(refresh.to_string());
    }
    body
}
