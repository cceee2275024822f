//! Operator-facing admin API.
//!
//! Exposes the control plane over HTTP: jobs, alerts, metrics, health,
//! and cache administration. Every request passes through
//! [`track_requests`], which feeds the metrics collector and the
//! Prometheus registry.

pub mod alerts;
pub mod cache;
pub mod jobs;
pub mod monitor;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};

use crate::cache::CacheStore;
use crate::metrics::AppMetrics;
use crate::monitor::health::HealthAggregator;
use crate::monitor::Monitor;
use crate::scheduler::JobScheduler;

/// Shared state for all admin routes.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub monitor: Arc<Monitor>,
    pub health: Arc<HealthAggregator>,
    pub cache: Arc<CacheStore>,
    pub metrics: Arc<AppMetrics>,
}

/// Assemble the full admin router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(monitor::get_health))
        .route("/metrics", get(monitor::get_prometheus))
        .route("/admin/jobs", get(jobs::list_jobs))
        .route("/admin/jobs/:name/toggle", post(jobs::toggle_job))
        .route("/admin/jobs/:name/run", post(jobs::run_job))
        .route("/admin/alerts", get(alerts::list_alerts))
        .route("/admin/alerts/:id/resolve", post(alerts::resolve_alert))
        .route("/admin/metrics", get(monitor::get_metrics_snapshot))
        .route("/admin/cache/stats", get(cache::get_stats))
        .route("/admin/cache/stats/reset", post(cache::reset_stats))
        .route("/admin/cache", delete(cache::clear_cache))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .with_state(state)
}

/// Record every served request into the metrics collector and Prometheus.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();

    state
        .monitor
        .record_request(&path, elapsed.as_millis() as u64, status)
        .await;
    state
        .metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), &path, &status.to_string()])
        .inc();
    state.metrics.http_request_duration.observe(elapsed.as_secs_f64());

    response
}
