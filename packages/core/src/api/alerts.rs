//! Alert endpoints.
//!
//! Routes:
//! - `GET  /admin/alerts`            — active alerts (`?include_resolved=true` for all)
//! - `POST /admin/alerts/:id/resolve` — manually resolve an alert

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::monitor::types::Alert;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub include_resolved: Option<bool>,
}

/// `GET /admin/alerts` — unresolved alerts, newest activity first.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertsQuery>,
) -> Json<Vec<Alert>> {
    let alerts = if params.include_resolved.unwrap_or(false) {
        state.monitor.all_alerts().await
    } else {
        state.monitor.active_alerts().await
    };
    Json(alerts)
}

/// `POST /admin/alerts/:id/resolve` — idempotent manual resolution.
/// Resolving an unknown or already-resolved alert is a 404.
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    if state.monitor.resolve_alert(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Alert '{}' not found or already resolved", id)
            })),
        ))
    }
}
