//! Streams ComfyUI and model-download log files to the browser.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::state::AppState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// GET /logs/{identifier}
///
/// `model_downloads` selects the download log, anything else the ComfyUI
/// log. The file is streamed as it is on disk; a missing file is a
/// plain-text 404 because the UI shows the body verbatim.
pub async fn stream_log(State(state): State<AppState>, Path(identifier): Path<String>) -> Response {
    let path = state.config.log_path_for(&identifier);

    match tokio::fs::File::open(path).await {
        Ok(file) => {
            tracing::debug!(identifier = %identifier, path = %path.display(), "Streaming log file");
            let body = Body::from_stream(ReaderStream::new(file));
            ([(CONTENT_TYPE, TEXT_PLAIN), (CACHE_CONTROL, "no-cache")], body).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(identifier = %identifier, path = %path.display(), "Log file not found");
            (
                StatusCode::NOT_FOUND,
                [(CONTENT_TYPE, TEXT_PLAIN)],
                format!(
                    "Log file not found: {}. Process may not have started yet or no logs generated.",
                    path.display()
                ),
            )
                .into_response()
        }
        Err(e) => AppError::InternalError(format!(
            "Failed to open log file {}: {e}",
            path.display()
        ))
        .into_response(),
    }
}
