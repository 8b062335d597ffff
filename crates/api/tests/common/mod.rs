#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use podkeeper_api::config::ServerConfig;
use podkeeper_api::router::build_app_router;
use podkeeper_api::state::AppState;
use podkeeper_comfyui::scripts::ScriptRunner;
use podkeeper_core::lifecycle::{LifecycleAction, LifecycleError};
use podkeeper_core::probe::LivenessProbe;
use podkeeper_core::reconcile::{ReconcilePolicy, Reconciler};
use podkeeper_core::store::{FileStore, MemoryStore, RecordStore};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Probe whose answer the test flips by hand.
#[derive(Default)]
pub struct FakeProbe {
    alive: AtomicBool,
}

impl FakeProbe {
    pub fn set(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

#[async_trait]
impl LivenessProbe for FakeProbe {
    async fn probe(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Lifecycle that only counts calls.
#[derive(Default)]
pub struct CountingLifecycle {
    launches: AtomicUsize,
    terminates: AtomicUsize,
    script_missing: AtomicBool,
}

impl CountingLifecycle {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn terminates(&self) -> usize {
        self.terminates.load(Ordering::SeqCst)
    }

    pub fn remove_start_script(&self) {
        self.script_missing.store(true, Ordering::SeqCst);
    }
}

impl LifecycleAction for CountingLifecycle {
    fn launch(&self, _user: &str) -> Result<JoinHandle<()>, LifecycleError> {
        if self.script_missing.load(Ordering::SeqCst) {
            return Err(LifecycleError::ScriptNotFound(PathBuf::from(
                "scripts/start_comfyui.sh",
            )));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(tokio::spawn(async {}))
    }

    fn terminate(&self) -> JoinHandle<()> {
        self.terminates.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async {})
    }
}

// ---------------------------------------------------------------------------
// App harness
// ---------------------------------------------------------------------------

/// A fully wired router plus handles on its fakes.
///
/// Every path the server touches lives inside `dir`.
pub struct TestApp {
    pub router: Router,
    pub probe: Arc<FakeProbe>,
    pub lifecycle: Arc<CountingLifecycle>,
    pub config: ServerConfig,
    pub dir: TempDir,
}

impl TestApp {
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        send(self.router.clone(), Method::GET, uri).await
    }

    pub async fn get_json(&self, uri: &str) -> serde_json::Value {
        body_json(self.get(uri).await).await
    }
}

/// Build a test `ServerConfig` rooted at `dir`, then apply `overrides`.
pub fn test_config(dir: &Path, overrides: &[(&str, &str)]) -> ServerConfig {
    let at = |relative: &str| dir.join(relative).display().to_string();

    let mut vars: HashMap<String, String> = HashMap::from([
        ("HOST".to_string(), "127.0.0.1".to_string()),
        ("PORT".to_string(), "0".to_string()),
        ("SCRIPTS_DIR".to_string(), at("scripts")),
        ("COMFYUI_LOG_PATH".to_string(), at("logs/comfyui.log")),
        ("DOWNLOAD_LOG_PATH".to_string(), at("logs/comfyui_model_downloads.log")),
        ("VOLUME_MAP_PATH".to_string(), at("volume_map.json")),
        ("STATIC_DIR".to_string(), at("public")),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    ServerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// Build the full application router around a fake probe (initially dead)
/// and a counting lifecycle.
pub fn build_test_app() -> TestApp {
    build_test_app_with(&[])
}

/// Same as [`build_test_app`] with extra environment overrides.
pub fn build_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("scripts")).unwrap();

    let config = test_config(dir.path(), overrides);
    let probe = Arc::new(FakeProbe::default());
    let lifecycle = Arc::new(CountingLifecycle::default());

    let store: Box<dyn RecordStore> = match &config.status_file {
        Some(path) => Box::new(FileStore::new(path.clone())),
        None => Box::new(MemoryStore::new()),
    };
    let policy = ReconcilePolicy {
        grace_period: config.grace_period,
        claim: config.claim_policy,
    };
    let reconciler = Arc::new(Reconciler::new(
        store,
        probe.clone(),
        lifecycle.clone(),
        policy,
    ));
    let scripts = Arc::new(ScriptRunner::new(
        config.scripts_dir.clone(),
        config.kill_pattern.clone(),
        config.download_log_path.clone(),
    ));

    let state = AppState::new(config.clone(), reconciler, scripts);
    let router = build_app_router(state, &config);

    TestApp {
        router,
        probe,
        lifecycle,
        config,
        dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
