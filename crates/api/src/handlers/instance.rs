//! Handlers for starting, stopping and inspecting the ComfyUI instance.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use podkeeper_core::ownership::{Owner, OwnershipRecord};
use podkeeper_core::reconcile::StartOutcome;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Reconciled status as the browser UI reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub running: bool,
    /// Owner name, `"unknown"` for an unowned live instance, or `null`.
    pub user: Option<Owner>,
    pub start_time: Option<DateTime<Utc>>,
    /// Whole seconds since `start_time`; `0` when stopped.
    pub uptime: i64,
}

impl StatusResponse {
    pub fn from_record(record: &OwnershipRecord, now: DateTime<Utc>) -> Self {
        Self {
            running: record.running(),
            user: record.owner().cloned(),
            start_time: record.declared_at(),
            uptime: record.uptime_secs(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub status: StatusResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let record = state.reconciler.current().await;
    Json(StatusResponse::from_record(&record, Utc::now()))
}

/// GET /start_comfyui/{user}
///
/// Launches ComfyUI for `user`, or hands an unowned live instance to them.
/// Fails with 409 when someone else holds it.
pub async fn start_instance(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> AppResult<Json<ActionResponse>> {
    let outcome = state.reconciler.start(&user).await?;

    let message = match &outcome {
        StartOutcome::Launched(_) => format!("Starting ComfyUI for {user}..."),
        StartOutcome::Claimed(_) => format!("ComfyUI is already running. Claimed by {user}."),
        StartOutcome::AlreadyRunning(_) => format!("ComfyUI is already running for {user}."),
    };

    Ok(Json(ActionResponse {
        success: true,
        message,
        status: StatusResponse::from_record(outcome.record(), Utc::now()),
    }))
}

/// GET /stop_comfyui -- always succeeds.
pub async fn stop_instance(State(state): State<AppState>) -> Json<ActionResponse> {
    let outcome = state.reconciler.stop().await;

    let message = match &outcome.previous_owner {
        Some(owner) => format!("Stopped ComfyUI (was running for {owner})"),
        None => "Stopped ComfyUI".to_string(),
    };

    Json(ActionResponse {
        success: true,
        message,
        status: StatusResponse::from_record(&outcome.record, Utc::now()),
    })
}
