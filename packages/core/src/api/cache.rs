//! Cache administration endpoints.
//!
//! Routes:
//! - `GET    /admin/cache/stats`       — hit/miss counters
//! - `POST   /admin/cache/stats/reset` — zero the counters
//! - `DELETE /admin/cache?pattern=...` — clear by pattern, or everything

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::cache::CacheStats;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub pattern: Option<String>,
}

/// `GET /admin/cache/stats`
pub async fn get_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// `POST /admin/cache/stats/reset`
pub async fn reset_stats(State(state): State<AppState>) -> StatusCode {
    state.cache.reset_stats();
    StatusCode::NO_CONTENT
}

/// `DELETE /admin/cache` — with `?pattern=trending:*` clears one
/// namespace; without a pattern clears every key under the prefix.
pub async fn clear_cache(
    State(state): State<AppState>,
    Query(params): Query<ClearQuery>,
) -> Json<serde_json::Value> {
    let removed = match params.pattern.as_deref() {
        Some(pattern) => state.cache.clear_by_pattern(pattern).await,
        None => state.cache.clear_all().await,
    };
    Json(serde_json::json!({ "removed": removed }))
}
