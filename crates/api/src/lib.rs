//! HTTP surface of the ComfyUI launcher.
//!
//! Exposed as a library so the binary and the integration tests build the
//! exact same router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
