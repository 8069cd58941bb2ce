use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::cache::CacheStats;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn cache_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStats>, ApiError> {
    state
        .proxy
        .cache()
        .stats()
        .await
        .map(Json)
        .map_err(|e| ApiError::new(e, state.expose_details))
}

pub async fn cache_clear_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let removed = state
        .proxy
        .cache()
        .clear()
        .await
        .map_err(|e| ApiError::new(e, state.expose_details))?;
    info!(removed, "Cache cleared");
    Ok(Json(json!({
        "message": "Cache cleared successfully",
        "removed": removed
    })))
}
