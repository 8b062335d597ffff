//! Domain core for the podkeeper ComfyUI launcher.
//!
//! Holds the single-tenant ownership record, the record stores it can be
//! persisted in, and the [`Reconciler`](reconcile::Reconciler) that merges
//! the declared record with live probe results. Integrations with the real
//! ComfyUI process plug in through the [`probe::LivenessProbe`] and
//! [`lifecycle::LifecycleAction`] traits.

pub mod error;
pub mod lifecycle;
pub mod ownership;
pub mod probe;
pub mod reconcile;
pub mod store;
pub mod volume_map;
