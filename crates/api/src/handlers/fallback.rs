use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Final fallback when neither a route nor a static file matches.
pub async fn not_found(method: Method, uri: Uri) -> Response {
    tracing::debug!(%method, path = %uri.path(), "No route or static file");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": format!("Endpoint not found: {method} {}", uri.path()),
        })),
    )
        .into_response()
}
