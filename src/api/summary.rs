use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::{
    error::Error,
    server::AppState,
    spotify::summary::{self, SummaryOptions},
    types::VibeSummary,
    utils,
};

use super::session::SessionId;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    limit: Option<String>,
}

/// `GET /api/vibe-summary`
///
/// Always 200 once the session is valid; failed sections are listed under
/// `errors`.
pub async fn vibe_summary(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<VibeSummary>, Error> {
    let defaults = SummaryOptions::default();
    let options = SummaryOptions {
        limit: utils::parse_bounded("limit", query.limit.as_deref(), defaults.limit, 1..=50)?,
    };

    Ok(Json(summary::build(&state.api, &id, options).await?))
}
