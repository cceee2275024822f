//! Health and metrics endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::monitor::types::{HealthStatus, MetricsSnapshot};

use super::AppState;

/// `GET /health` — the consolidated operational signal. Responds 503 when
/// the aggregate is unhealthy so load balancers can act on it.
pub async fn get_health(State(state): State<AppState>) -> Response {
    let health = state.health.aggregate().await;
    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(health)).into_response()
}

/// `GET /admin/metrics` — performance digest plus the latest resource sample.
pub async fn get_metrics_snapshot(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.monitor.snapshot().await)
}

/// `GET /metrics` — Prometheus text exposition. Gauges that mirror live
/// state (active alerts, cache counters) are refreshed before rendering.
pub async fn get_prometheus(State(state): State<AppState>) -> Response {
    let alerts = state.monitor.active_alerts().await;
    state.metrics.alerts_active.set(alerts.len() as f64);

    let cache_stats = state.cache.stats();
    state.metrics.cache_hits.set(cache_stats.hits as f64);
    state.metrics.cache_misses.set(cache_stats.misses as f64);

    match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(err) => {
            tracing::error!("Metrics render failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
