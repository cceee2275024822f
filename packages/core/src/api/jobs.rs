//! Job administration endpoints.
//!
//! Routes:
//! - `GET  /admin/jobs`             — list jobs with their stats
//! - `POST /admin/jobs/:name/toggle` — enable/disable a job's trigger
//! - `POST /admin/jobs/:name/run`    — execute a job immediately

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::scheduler::{JobStatus, RunOutcome};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// `GET /admin/jobs` — every registered job with its counters.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobStatus>> {
    Json(state.scheduler.jobs().await)
}

/// `POST /admin/jobs/:name/toggle` — start or stop the job's trigger.
pub async fn toggle_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    if state.scheduler.toggle(&name, body.enabled).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Unknown job '{}'", name) })),
        ))
    }
}

/// `POST /admin/jobs/:name/run` — run the job body now, outside its cadence.
pub async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RunOutcome>, (StatusCode, Json<serde_json::Value>)> {
    match state.scheduler.run_now(&name).await {
        Some(outcome) => Ok(Json(outcome)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Unknown job '{}'", name) })),
        )),
    }
}
