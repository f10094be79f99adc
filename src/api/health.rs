use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use crate::server::AppState;

/// `GET /health`: liveness plus the number of live sessions.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.store.len().await.ok();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": sessions,
    }))
}
