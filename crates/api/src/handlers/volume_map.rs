use axum::extract::State;
use axum::Json;
use podkeeper_core::volume_map::{load_volume_map, VolumeMap};

use crate::state::AppState;

/// GET /volume_map.json -- re-read on every request so edits apply live.
pub async fn get_volume_map(State(state): State<AppState>) -> Json<VolumeMap> {
    Json(load_volume_map(&state.config.volume_map_path).await)
}
