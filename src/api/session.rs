use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{SignedCookieJar, cookie::Key};

use crate::{error::Error, server::AppState};

use super::cookies::{self, SESSION_COOKIE};

/// Id of the live session named by the signed session cookie.
///
/// Rejects with [`Error::Unauthenticated`] (401) when the cookie is missing,
/// fails signature verification, or names a session the store no longer
/// holds.
///
/// ```rust,ignore
/// async fn me(
///     State(state): State<AppState>,
///     SessionId(id): SessionId,
/// ) -> Result<Json<Value>, Error> {
///     Ok(Json(state.api.call(&id, Method::GET, "/me", &[]).await?))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

impl FromRequestParts<AppState> for SessionId {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar: SignedCookieJar<Key> = SignedCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| Error::Unauthenticated)?;

        let session_id = cookies::value(&jar, SESSION_COOKIE).ok_or(Error::Unauthenticated)?;

        match state.store.get(&session_id).await? {
            Some(_) => Ok(SessionId(session_id)),
            None => Err(Error::Unauthenticated),
        }
    }
}
