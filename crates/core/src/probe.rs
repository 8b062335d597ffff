//! Liveness probe seam.
//!
//! A probe answers one question: is the external ComfyUI process reachable
//! right now? Implementations must bound themselves by a short timeout and
//! report every failure (refused connection, timeout, bad status) as
//! "not alive" rather than returning an error.

use async_trait::async_trait;

#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Returns `true` if the external process answered within the probe's
    /// timeout budget.
    async fn probe(&self) -> bool;
}
