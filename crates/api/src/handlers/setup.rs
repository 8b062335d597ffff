use axum::extract::State;
use axum::Json;
use podkeeper_core::error::CoreError;
use podkeeper_core::lifecycle::LifecycleError;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub link: String,
}

/// GET /setup -- kick off the model download and return immediately.
pub async fn start_model_download(State(state): State<AppState>) -> AppResult<Json<SetupResponse>> {
    match state.scripts.download_models().await {
        Ok(_detached) => Ok(Json(SetupResponse {
            success: true,
            message: "Model download started. Check logs for progress.",
        })),
        Err(LifecycleError::ScriptNotFound(path)) => {
            tracing::warn!(path = %path.display(), "Setup script not found");
            Err(CoreError::NotFound("Setup script not found".to_string()).into())
        }
        Err(e) => Err(AppError::InternalError(e.to_string())),
    }
}

/// GET /copy_link
pub async fn copy_link(State(state): State<AppState>) -> Json<LinkResponse> {
    Json(LinkResponse {
        link: state.config.comfyui_link(),
    })
}
