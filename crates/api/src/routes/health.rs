use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handlers::instance::StatusResponse;
use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"healthy"` while the server answers.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since this server process started.
    pub uptime: f64,
    /// Reconciled ComfyUI status.
    pub current_status: StatusResponse,
}

/// GET /health -- server liveness plus the reconciled ComfyUI status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let record = state.reconciler.current().await;
    let now = Utc::now();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now,
        uptime: state.started_at.elapsed().as_secs_f64(),
        current_status: StatusResponse::from_record(&record, now),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
