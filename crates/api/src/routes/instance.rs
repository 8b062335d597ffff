use axum::routing::get;
use axum::Router;

use crate::handlers::instance;
use crate::state::AppState;

/// Instance lifecycle routes.
///
/// ```text
/// GET /start_comfyui/{user}   start_instance
/// GET /stop_comfyui           stop_instance
/// GET /status                 get_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start_comfyui/{user}", get(instance::start_instance))
        .route("/stop_comfyui", get(instance::stop_instance))
        .route("/status", get(instance::get_status))
}
