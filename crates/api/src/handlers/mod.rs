pub mod fallback;
pub mod instance;
pub mod logs;
pub mod setup;
pub mod volume_map;
