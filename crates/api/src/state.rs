use std::sync::Arc;
use std::time::Instant;

use podkeeper_comfyui::probe::{HttpProbe, TcpProbe};
use podkeeper_comfyui::scripts::ScriptRunner;
use podkeeper_core::probe::LivenessProbe;
use podkeeper_core::reconcile::{ReconcilePolicy, Reconciler};
use podkeeper_core::store::{FileStore, MemoryStore, RecordStore};

use crate::config::{ProbeStrategy, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Sole owner of the ownership record.
    pub reconciler: Arc<Reconciler>,
    /// Script runner, also used directly by the setup endpoint.
    pub scripts: Arc<ScriptRunner>,
    /// When this server process started; reported by `/health`.
    pub started_at: Instant,
}

impl AppState {
    /// Wire the production probe, store and script runner from `config`.
    pub fn from_config(config: ServerConfig) -> Self {
        let probe: Arc<dyn LivenessProbe> = match config.probe_strategy {
            ProbeStrategy::Port => Arc::new(TcpProbe::new(
                config.comfyui_host.clone(),
                config.comfyui_port,
                config.probe_timeout,
            )),
            ProbeStrategy::Http => Arc::new(HttpProbe::new(
                config.comfyui_base_url(),
                config.probe_timeout,
            )),
        };

        let store: Box<dyn RecordStore> = match &config.status_file {
            Some(path) => Box::new(FileStore::new(path.clone())),
            None => Box::new(MemoryStore::new()),
        };

        let scripts = Arc::new(ScriptRunner::new(
            config.scripts_dir.clone(),
            config.kill_pattern.clone(),
            config.download_log_path.clone(),
        ));

        let policy = ReconcilePolicy {
            grace_period: config.grace_period,
            claim: config.claim_policy,
        };
        let reconciler = Arc::new(Reconciler::new(store, probe, scripts.clone(), policy));

        Self::new(config, reconciler, scripts)
    }

    /// Assemble state from already-built parts.
    pub fn new(config: ServerConfig, reconciler: Arc<Reconciler>, scripts: Arc<ScriptRunner>) -> Self {
        Self {
            config: Arc::new(config),
            reconciler,
            scripts,
            started_at: Instant::now(),
        }
    }
}
