//! ComfyUI process integration.
//!
//! Provides the liveness probes that check whether a ComfyUI server is
//! reachable, and the script runner that launches, terminates and seeds
//! models for it on the local machine.

pub mod probe;
pub mod scripts;
