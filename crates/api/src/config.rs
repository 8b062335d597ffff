use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use podkeeper_comfyui::scripts::DEFAULT_KILL_PATTERN;
use podkeeper_core::reconcile::{ClaimPolicy, DEFAULT_GRACE_PERIOD};

/// Log identifier that selects the model download log; any other
/// identifier selects the ComfyUI log.
pub const MODEL_DOWNLOADS_LOG: &str = "model_downloads";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// How the server decides whether ComfyUI is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// TCP connect to the ComfyUI port.
    Port,
    /// GET the ComfyUI stats endpoint, then its root page.
    Http,
}

impl FromStr for ProbeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "port" | "tcp" => Ok(ProbeStrategy::Port),
            "http" => Ok(ProbeStrategy::Http),
            other => Err(format!("expected 'port' or 'http', got '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults matching a RunPod-style GPU box where ComfyUI
/// lives on port 8188 and writes its logs under `/workspace/logs`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Host ComfyUI listens on (default: `127.0.0.1`).
    pub comfyui_host: String,
    /// Port ComfyUI listens on (default: `8188`).
    pub comfyui_port: u16,
    pub probe_strategy: ProbeStrategy,
    pub probe_timeout: Duration,
    /// Window after a start during which a dead probe is not trusted.
    pub grace_period: Duration,
    pub claim_policy: ClaimPolicy,
    /// Status file; `None` keeps the ownership record in memory only.
    pub status_file: Option<PathBuf>,
    pub scripts_dir: PathBuf,
    /// `pkill -f` pattern used when the stop script is missing.
    pub kill_pattern: String,
    pub comfyui_log_path: PathBuf,
    pub download_log_path: PathBuf,
    pub volume_map_path: PathBuf,
    /// Directory of static browser assets.
    pub static_dir: PathBuf,
    /// RunPod pod id, used to build the public ComfyUI link.
    pub pod_id: Option<String>,
    /// Free-form environment label, logged at startup.
    pub env_type: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                        |
    /// |------------------------|------------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                      |
    /// | `PORT`                 | `8000`                                         |
    /// | `CORS_ORIGINS`         | `http://localhost:8000`                        |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                           |
    /// | `COMFYUI_HOST`         | `127.0.0.1`                                    |
    /// | `COMFYUI_PORT`         | `8188`                                         |
    /// | `PROBE_STRATEGY`       | `port`                                         |
    /// | `PROBE_TIMEOUT_SECS`   | `3`                                            |
    /// | `GRACE_PERIOD_SECS`    | `45`                                           |
    /// | `CLAIM_POLICY`         | `claim`                                        |
    /// | `STATUS_FILE`          | unset (in-memory)                              |
    /// | `SCRIPTS_DIR`          | `./scripts`                                    |
    /// | `KILL_PATTERN`         | `main.py --listen`                             |
    /// | `COMFYUI_LOG_PATH`     | `/workspace/logs/comfyui.log`                  |
    /// | `DOWNLOAD_LOG_PATH`    | `/workspace/logs/comfyui_model_downloads.log`  |
    /// | `VOLUME_MAP_PATH`      | `./volume_map.json`                            |
    /// | `STATIC_DIR`           | `./public`                                     |
    /// | `RUNPOD_POD_ID`        | unset                                          |
    /// | `ENV_TYPE`             | `development`                                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let cors_origins = text("CORS_ORIGINS", "http://localhost:8000")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|e| ConfigError::Invalid {
                    key: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let claim_policy = match get("CLAIM_POLICY") {
            Some(raw) => raw.parse::<ClaimPolicy>().map_err(|e| ConfigError::Invalid {
                key: "CLAIM_POLICY",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => ClaimPolicy::default(),
        };

        Ok(Self {
            host: parse(&get, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse(&get, "PORT", 8000)?,
            cors_origins,
            request_timeout_secs: parse(&get, "REQUEST_TIMEOUT_SECS", 30)?,
            comfyui_host: text("COMFYUI_HOST", "127.0.0.1"),
            comfyui_port: parse(&get, "COMFYUI_PORT", 8188)?,
            probe_strategy: parse(&get, "PROBE_STRATEGY", ProbeStrategy::Port)?,
            probe_timeout: Duration::from_secs(parse(&get, "PROBE_TIMEOUT_SECS", 3)?),
            grace_period: Duration::from_secs(parse(
                &get,
                "GRACE_PERIOD_SECS",
                DEFAULT_GRACE_PERIOD.as_secs(),
            )?),
            claim_policy,
            status_file: get("STATUS_FILE").map(PathBuf::from),
            scripts_dir: PathBuf::from(text("SCRIPTS_DIR", "./scripts")),
            kill_pattern: text("KILL_PATTERN", DEFAULT_KILL_PATTERN),
            comfyui_log_path: PathBuf::from(text("COMFYUI_LOG_PATH", "/workspace/logs/comfyui.log")),
            download_log_path: PathBuf::from(text(
                "DOWNLOAD_LOG_PATH",
                "/workspace/logs/comfyui_model_downloads.log",
            )),
            volume_map_path: PathBuf::from(text("VOLUME_MAP_PATH", "./volume_map.json")),
            static_dir: PathBuf::from(text("STATIC_DIR", "./public")),
            pod_id: get("RUNPOD_POD_ID"),
            env_type: text("ENV_TYPE", "development"),
        })
    }

    /// Log file served for `GET /logs/{identifier}`.
    pub fn log_path_for(&self, identifier: &str) -> &Path {
        if identifier == MODEL_DOWNLOADS_LOG {
            &self.download_log_path
        } else {
            &self.comfyui_log_path
        }
    }

    /// Browser-facing ComfyUI URL: the RunPod proxy when a pod id is known,
    /// otherwise localhost.
    pub fn comfyui_link(&self) -> String {
        match &self.pod_id {
            Some(pod_id) => format!("https://{pod_id}-{}.proxy.runpod.net", self.comfyui_port),
            None => format!("https://localhost:{}", self.comfyui_port),
        }
    }

    /// Base URL for HTTP liveness probes.
    pub fn comfyui_base_url(&self) -> String {
        format!("http://{}:{}", self.comfyui_host, self.comfyui_port)
    }
}

/// Parse `key` with [`FromStr`], using `default` when it is unset.
fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
