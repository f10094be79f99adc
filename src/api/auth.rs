use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::SignedCookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{error::Error, server::AppState, types::SessionRecord, utils};

use super::{
    cookies::{self, SESSION_COOKIE, STATE_COOKIE},
    session::SessionId,
};

const STATE_BYTES: usize = 16;

/// 302 to `location`. `Redirect::to` answers 303, which the OAuth flow
/// does not expect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// `GET /auth/login`: issues a fresh state cookie and redirects to Spotify.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Response) {
    let csrf = utils::random_token(STATE_BYTES);
    let location = state.tokens.authorize_url(&csrf);

    tracing::debug!("redirecting to the Spotify authorize endpoint");
    (
        jar.add(cookies::state_cookie(&state.config, csrf)),
        found(&location),
    )
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /auth/callback`: completes the authorization-code flow.
///
/// The state cookie is single-use and is cleared on every outcome.
pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> (SignedCookieJar, Response) {
    let expected = cookies::value(&jar, STATE_COOKIE);
    let jar = jar.remove(cookies::removal(STATE_COOKIE));

    if let Some(reason) = params.error {
        tracing::info!(reason = %reason, "authorization was not granted");
        let location = state
            .config
            .frontend_url(&format!("/?error={}", urlencoding::encode(&reason)));
        return (jar, found(&location));
    }

    let state_matches = matches!(
        (&expected, &params.state),
        (Some(expected), Some(returned)) if expected == returned
    );
    if !state_matches {
        tracing::warn!(
            cookie_present = expected.is_some(),
            param_present = params.state.is_some(),
            "OAuth state mismatch"
        );
        return (jar, Error::CsrfMismatch.into_response());
    }

    let Some(code) = params.code else {
        return (
            jar,
            Error::BadRequest("missing authorization code".into()).into_response(),
        );
    };

    match establish_session(&state, &code).await {
        Ok(session_id) => {
            let jar = jar.add(cookies::session_cookie(&state.config, session_id));
            (jar, found(&state.config.frontend_url("/dashboard")))
        }
        Err(e) => {
            tracing::warn!(error = %e, "authorization code exchange failed");
            let location = state.config.frontend_url("/?error=token_exchange_failed");
            (jar, found(&location))
        }
    }
}

async fn establish_session(state: &AppState, code: &str) -> Result<String, Error> {
    let grant = state
        .tokens
        .exchange_authorization_code(code, state.tokens.redirect_uri())
        .await?;
    let record = SessionRecord::from_grant(grant, Utc::now())?;
    let session_id = state.store.create(record).await?;

    tracing::info!("session created");
    Ok(session_id)
}

/// `POST /api/logout`
pub async fn logout(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Json<serde_json::Value>), Error> {
    state.store.delete(&session_id).await?;
    tracing::info!("session logged out");

    Ok((
        jar.remove(cookies::removal(SESSION_COOKIE)),
        Json(json!({ "ok": true })),
    ))
}

/// `GET /logout`: browser-navigable logout.
///
/// Drops the session if the cookie names one, clears the cookie and returns
/// to the frontend. Succeeds without a session too.
pub async fn logout_redirect(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Response) {
    if let Some(session_id) = cookies::value(&jar, SESSION_COOKIE) {
        match state.store.delete(&session_id).await {
            Ok(true) => tracing::info!("session logged out"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "cannot delete session on logout"),
        }
    }

    (
        jar.remove(cookies::removal(SESSION_COOKIE)),
        found(state.config.frontend_uri.as_str()),
    )
}

/// `POST /api/refresh-token`: refreshes the access token now.
///
/// A rejected refresh removes the session, so the cookie is cleared too.
pub async fn refresh_token(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
    jar: SignedCookieJar,
) -> Response {
    match state.api.force_refresh(&session_id).await {
        Ok(expires_at) => Json(json!({ "ok": true, "expiresAt": expires_at })).into_response(),
        Err(e @ Error::SessionExpired) => {
            (jar.remove(cookies::removal(SESSION_COOKIE)), e).into_response()
        }
        Err(e) => e.into_response(),
    }
}
