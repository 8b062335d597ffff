pub mod health;
pub mod instance;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the launcher route tree.
///
/// Route hierarchy:
///
/// ```text
/// /start_comfyui/{user}     start or claim the instance
/// /stop_comfyui             stop the instance
/// /status                   reconciled status
/// /logs/{identifier}        stream a log file
/// /setup                    start the model download
/// /copy_link                public ComfyUI URL
/// /volume_map.json          volume group -> users
/// ```
///
/// Everything is GET, matching the browser UI.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(instance::router())
        .route("/logs/{identifier}", get(handlers::logs::stream_log))
        .route("/setup", get(handlers::setup::start_model_download))
        .route("/copy_link", get(handlers::setup::copy_link))
        .route("/volume_map.json", get(handlers::volume_map::get_volume_map))
}
