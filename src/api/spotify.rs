use axum::{
    Json,
    extract::{Path, Query, State},
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::Error,
    server::AppState,
    spotify::summary,
    types::{TimeRange, TopKind},
    utils,
};

use super::session::SessionId;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 50;
const MAX_OFFSET: u32 = 100_000;

type ApiResult = Result<Json<Value>, Error>;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    limit: Option<String>,
    offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    limit: Option<String>,
    time_range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdsQuery {
    ids: Option<String>,
}

fn limit_param(raw: Option<&str>) -> Result<(&'static str, String), Error> {
    let limit = utils::parse_bounded("limit", raw, DEFAULT_LIMIT, 1..=MAX_LIMIT)?;
    Ok(("limit", limit.to_string()))
}

/// `GET /api/me`
pub async fn me(State(state): State<AppState>, SessionId(id): SessionId) -> ApiResult {
    Ok(Json(state.api.call(&id, Method::GET, "/me", &[]).await?))
}

/// `GET /api/top/{type}`
pub async fn top_items(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    Path(kind): Path<String>,
    Query(query): Query<TopQuery>,
) -> ApiResult {
    let kind: TopKind = kind.parse()?;
    let time_range = match query.time_range.as_deref() {
        Some(raw) => raw.parse()?,
        None => TimeRange::MediumTerm,
    };
    let params = [
        limit_param(query.limit.as_deref())?,
        ("time_range", time_range.to_string()),
    ];

    let path = format!("/me/top/{}", kind.as_str());
    Ok(Json(state.api.call(&id, Method::GET, &path, &params).await?))
}

/// `GET /api/recently-played`
pub async fn recently_played(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    let params = [limit_param(query.limit.as_deref())?];
    Ok(Json(
        state
            .api
            .call(&id, Method::GET, "/me/player/recently-played", &params)
            .await?,
    ))
}

/// `GET /api/playlists`
pub async fn playlists(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    let offset = utils::parse_bounded("offset", query.offset.as_deref(), 0, 0..=MAX_OFFSET)?;
    let params = [
        limit_param(query.limit.as_deref())?,
        ("offset", offset.to_string()),
    ];
    Ok(Json(
        state
            .api
            .call(&id, Method::GET, "/me/playlists", &params)
            .await?,
    ))
}

/// `GET /api/audio-features?ids=a,b,c`
///
/// Batched in chunks the upstream accepts. Ids whose chunk failed come back
/// as `null`; the request fails only when nothing could be fetched.
pub async fn audio_features(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    Query(query): Query<IdsQuery>,
) -> ApiResult {
    let ids = utils::parse_id_list(query.ids.as_deref().unwrap_or_default());
    if ids.is_empty() {
        return Err(Error::BadRequest("ids must list at least one track id".into()));
    }

    let (features, error) = summary::fetch_audio_features(&state.api, &id, &ids).await;
    if let Some(e) = error {
        if features.iter().all(Option::is_none) {
            return Err(e);
        }
    }

    Ok(Json(json!({ "audio_features": features })))
}

/// `GET /api/now-playing`: `null` when nothing is playing.
pub async fn now_playing(State(state): State<AppState>, SessionId(id): SessionId) -> ApiResult {
    Ok(Json(
        state
            .api
            .call(&id, Method::GET, "/me/player/currently-playing", &[])
            .await?,
    ))
}
