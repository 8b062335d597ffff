use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use podkeeper_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds a catch-all 500 variant.
/// Implements [`IntoResponse`] to produce the `{ success: false, message }`
/// body the browser UI expects.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `podkeeper_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An internal error; the message is echoed back as `error`.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Core(core) => match core {
                CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            },
            AppError::InternalError(msg) => return internal_error_response(&msg),
        };

        let body = json!({
            "success": false,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Build the 500 response body, embedding the underlying error message.
fn internal_error_response(error: &str) -> Response {
    tracing::error!(error = %error, "Unhandled error");

    let body = json!({
        "success": false,
        "message": "Internal server error",
        "error": error,
    });

    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}

/// Turn a caught handler panic into the standard 500 response.
///
/// Used with `CatchPanicLayer::custom`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };

    internal_error_response(&detail)
}
