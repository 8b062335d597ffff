//! Volume-group to user-name mapping consumed by the browser UI.

use std::path::Path;

use indexmap::IndexMap;

/// Group id -> ordered list of user names. Insertion order is preserved.
pub type VolumeMap = IndexMap<String, Vec<String>>;

/// Built-in mapping served when no volume map file is available.
pub fn default_volume_map() -> VolumeMap {
    [
        ("vol_1", &["Sri", "Bharath"][..]),
        ("vol_2", &["Pavan", "Moulika"][..]),
        ("vol_3", &["Abhijith", "Abhiram", "Sneha"][..]),
        ("vol_4", &["Shakthi"][..]),
        ("no_vol", &["Intern"][..]),
    ]
    .into_iter()
    .map(|(group, users)| {
        (
            group.to_string(),
            users.iter().map(|u| u.to_string()).collect(),
        )
    })
    .collect()
}

/// Load the mapping from `path`, falling back to [`default_volume_map`]
/// when the file is missing, unreadable, or not a valid mapping.
pub async fn load_volume_map(path: &Path) -> VolumeMap {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "volume_map.json not found, returning default");
            return default_volume_map();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read volume map, returning default");
            return default_volume_map();
        }
    };

    match serde_json::from_slice::<VolumeMap>(&bytes) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Malformed volume map, returning default");
            default_volume_map()
        }
    }
}
