//! Liveness probes for a local ComfyUI server.
//!
//! [`TcpProbe`] checks that something accepts connections on the ComfyUI
//! port. [`HttpProbe`] asks the server itself, first on its stats endpoint
//! and then on its root page. Both are bounded by a timeout and collapse
//! every failure into "not alive".

use std::time::Duration;

use async_trait::async_trait;
use podkeeper_core::probe::LivenessProbe;
use tokio::net::TcpStream;

/// Default probe budget.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Endpoint ComfyUI answers once it has finished booting.
pub const LIVENESS_PATH: &str = "/system_stats";

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

/// Probe that succeeds when a TCP connection to `host:port` opens in time.
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn probe(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let alive = matches!(tokio::time::timeout(self.timeout, connect).await, Ok(Ok(_)));

        tracing::debug!(host = %self.host, port = self.port, alive, "Port check");
        alive
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Probe that issues short GET requests against the ComfyUI HTTP server.
pub struct HttpProbe {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpProbe {
    /// * `base_url` - HTTP base URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// GET `path` and report whether a non-empty 2xx body came back.
    async fn answers(&self, path: &str) -> bool {
        let url = format!("{}{}", self.base_url, path);
        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Liveness request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(url = %url, status = %response.status(), "Liveness request rejected");
            return false;
        }

        match response.bytes().await {
            Ok(body) => !body.is_empty(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Liveness body unreadable");
                false
            }
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self) -> bool {
        // One budget covers both requests, not one budget each.
        let check = async { self.answers(LIVENESS_PATH).await || self.answers("/").await };
        let alive = tokio::time::timeout(self.timeout, check).await.unwrap_or(false);
        tracing::debug!(base_url = %self.base_url, alive, "HTTP liveness check");
        alive
    }
}
