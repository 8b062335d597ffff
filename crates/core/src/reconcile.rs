//! Reconciliation of the declared ownership record against live probes.
//!
//! [`reconcile_record`] is the pure transition table; [`Reconciler`] wraps
//! it with the record store, the liveness probe and the lifecycle actions.
//! All record reads and writes happen under one mutex, so each
//! read -> decide -> write sequence is atomic with respect to every other
//! start/stop/status call.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::lifecycle::{LifecycleAction, LifecycleError};
use crate::ownership::{validate_user_name, InstanceStatus, Owner, OwnershipRecord};
use crate::probe::LivenessProbe;
use crate::store::RecordStore;

/// Typical ComfyUI cold-start latency; a dead probe inside this window is
/// not trusted.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(45);

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What a start request does when the instance is alive but unowned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimPolicy {
    /// The requesting user takes ownership without a relaunch.
    #[default]
    Claim,
    /// The request is refused until someone stops the instance.
    Reject,
}

impl FromStr for ClaimPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claim" => Ok(ClaimPolicy::Claim),
            "reject" => Ok(ClaimPolicy::Reject),
            other => Err(CoreError::Validation(format!(
                "Unknown claim policy '{other}' (expected 'claim' or 'reject')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub grace_period: Duration,
    pub claim: ClaimPolicy,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            claim: ClaimPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure transition
// ---------------------------------------------------------------------------

/// Whether `record` was declared less than `grace` before `now`.
///
/// A declaration in the future (clock stepped back) counts as inside the
/// window; a record without a timestamp never does.
fn within_grace(record: &OwnershipRecord, now: DateTime<Utc>, grace: Duration) -> bool {
    match record.declared_at() {
        Some(at) => match (now - at).to_std() {
            Ok(elapsed) => elapsed < grace,
            Err(_) => true,
        },
        None => false,
    }
}

/// Merge a declared record with a probe verdict.
///
/// Returns the record that must replace the stored one, or `None` when the
/// stored record already reflects reality.
///
/// | record  | probe | result                                         |
/// |---------|-------|------------------------------------------------|
/// | running | alive | unchanged                                      |
/// | running | dead  | unchanged inside grace (real owner), else reset|
/// | stopped | alive | adopted as `Owner::Unknown`                    |
/// | stopped | dead  | unchanged                                      |
pub fn reconcile_record(
    record: &OwnershipRecord,
    alive: bool,
    now: DateTime<Utc>,
    grace: Duration,
) -> Option<OwnershipRecord> {
    match (record.status(), alive) {
        (InstanceStatus::Running(_), true) => None,
        (InstanceStatus::Running(Owner::User(_)), false) if within_grace(record, now, grace) => {
            None
        }
        (InstanceStatus::Running(_), false) => Some(OwnershipRecord::stopped()),
        (InstanceStatus::Stopped, true) => Some(OwnershipRecord::held(Owner::Unknown, now)),
        (InstanceStatus::Stopped, false) => None,
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a successful start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The requesting user already held the instance; nothing was launched.
    AlreadyRunning(OwnershipRecord),
    /// An unowned live instance was handed to the requesting user.
    Claimed(OwnershipRecord),
    /// A launch was submitted and the record now names the user.
    Launched(OwnershipRecord),
}

impl StartOutcome {
    pub fn record(&self) -> &OwnershipRecord {
        match self {
            StartOutcome::AlreadyRunning(r) | StartOutcome::Claimed(r) | StartOutcome::Launched(r) => r,
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    /// Owner according to the reconciled record before the stop.
    pub previous_owner: Option<Owner>,
    pub record: OwnershipRecord,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Sole owner of the ownership record.
///
/// Created once at startup; share it behind an `Arc`.
pub struct Reconciler {
    store: Mutex<Box<dyn RecordStore>>,
    probe: Arc<dyn LivenessProbe>,
    lifecycle: Arc<dyn LifecycleAction>,
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(
        store: Box<dyn RecordStore>,
        probe: Arc<dyn LivenessProbe>,
        lifecycle: Arc<dyn LifecycleAction>,
        policy: ReconcilePolicy,
    ) -> Self {
        tracing::info!(
            store = %store.describe(),
            grace_period_secs = policy.grace_period.as_secs(),
            claim_policy = ?policy.claim,
            "Reconciler created",
        );
        Self {
            store: Mutex::new(store),
            probe,
            lifecycle,
            policy,
        }
    }

    /// Probe once at boot and drop a stale "running" claim outright.
    ///
    /// No start issued by a previous incarnation of this service can still
    /// be booting, so the grace period does not apply here.
    pub async fn initialize(&self) -> OwnershipRecord {
        let alive = self.probe.probe().await;
        let store = self.store.lock().await;
        let record = load_or_default(store.as_ref()).await;

        if !alive && record.running() {
            tracing::info!(
                owner = ?record.owner().map(Owner::as_str),
                "ComfyUI not running at startup, resetting status",
            );
            let stopped = OwnershipRecord::stopped();
            save_logged(store.as_ref(), &stopped).await;
            return stopped;
        }

        self.apply(store.as_ref(), record, alive).await
    }

    /// Current reconciled record.
    pub async fn current(&self) -> OwnershipRecord {
        let alive = self.probe.probe().await;
        let store = self.store.lock().await;
        let record = load_or_default(store.as_ref()).await;
        self.apply(store.as_ref(), record, alive).await
    }

    /// Start (or claim) the instance for `user`.
    ///
    /// Errors:
    /// - [`CoreError::Validation`] for an unusable user name.
    /// - [`CoreError::Conflict`] when another user holds the instance, or
    ///   the owner is unknown and the policy is [`ClaimPolicy::Reject`].
    /// - [`CoreError::NotFound`] when the start script is missing.
    pub async fn start(&self, user: &str) -> Result<StartOutcome, CoreError> {
        validate_user_name(user)?;

        let alive = self.probe.probe().await;
        let store = self.store.lock().await;
        let loaded = load_or_default(store.as_ref()).await;
        let record = self.apply(store.as_ref(), loaded, alive).await;

        match record.status() {
            InstanceStatus::Running(Owner::User(owner)) if owner == user => {
                tracing::info!(user, "ComfyUI already running for requesting user");
                Ok(StartOutcome::AlreadyRunning(record))
            }
            InstanceStatus::Running(Owner::User(owner)) => {
                tracing::warn!(user, owner = %owner, "Start rejected, instance held by another user");
                Err(CoreError::Conflict(format!(
                    "ComfyUI is already running for user '{owner}'. Please stop it first."
                )))
            }
            InstanceStatus::Running(Owner::Unknown) => match self.policy.claim {
                ClaimPolicy::Claim => {
                    let claimed = OwnershipRecord::held(Owner::User(user.to_string()), Utc::now());
                    save_logged(store.as_ref(), &claimed).await;
                    tracing::info!(user, "Unowned ComfyUI instance claimed");
                    Ok(StartOutcome::Claimed(claimed))
                }
                ClaimPolicy::Reject => {
                    tracing::warn!(user, "Start rejected, instance running with unknown owner");
                    Err(CoreError::Conflict(
                        "ComfyUI is already running but its owner is unknown. Please stop it first."
                            .to_string(),
                    ))
                }
            },
            InstanceStatus::Stopped => {
                match self.lifecycle.launch(user) {
                    Ok(_detached) => {}
                    Err(LifecycleError::ScriptNotFound(path)) => {
                        tracing::error!(path = %path.display(), "Start script not found");
                        return Err(CoreError::NotFound("Start script not found".to_string()));
                    }
                    Err(e) => {
                        tracing::error!(user, error = %e, "Launch submission failed");
                    }
                }

                let launched = OwnershipRecord::held(Owner::User(user.to_string()), Utc::now());
                save_logged(store.as_ref(), &launched).await;
                tracing::info!(user, "ComfyUI launch submitted");
                Ok(StartOutcome::Launched(launched))
            }
        }
    }

    /// Stop the instance. Always succeeds and always leaves a stopped record.
    pub async fn stop(&self) -> StopOutcome {
        let alive = self.probe.probe().await;
        let store = self.store.lock().await;
        let loaded = load_or_default(store.as_ref()).await;
        let record = self.apply(store.as_ref(), loaded, alive).await;
        let previous_owner = record.owner().cloned();

        tracing::info!(
            previous_owner = ?previous_owner.as_ref().map(Owner::as_str),
            "Stopping ComfyUI",
        );

        // Detached: the stop outcome does not depend on the kill result.
        drop(self.lifecycle.terminate());

        let stopped = OwnershipRecord::stopped();
        save_logged(store.as_ref(), &stopped).await;

        StopOutcome {
            previous_owner,
            record: stopped,
        }
    }

    /// Best-effort teardown on process exit.
    ///
    /// If the record claims a running instance, submits a termination,
    /// waits at most `wait` for it, and resets the record.
    pub async fn shutdown(&self, wait: Duration) {
        let store = self.store.lock().await;
        let record = load_or_default(store.as_ref()).await;

        if !record.running() {
            tracing::info!("No ComfyUI instance recorded, nothing to stop");
            return;
        }

        tracing::info!(
            owner = ?record.owner().map(Owner::as_str),
            "Stopping ComfyUI before exit",
        );

        match tokio::time::timeout(wait, self.lifecycle.terminate()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Terminate task failed"),
            Err(_) => tracing::warn!(
                wait_secs = wait.as_secs(),
                "Terminate did not finish before shutdown deadline",
            ),
        }

        save_logged(store.as_ref(), &OwnershipRecord::stopped()).await;
    }

    /// Apply the transition table to `record`, persisting any rewrite.
    async fn apply(
        &self,
        store: &dyn RecordStore,
        record: OwnershipRecord,
        alive: bool,
    ) -> OwnershipRecord {
        match reconcile_record(&record, alive, Utc::now(), self.policy.grace_period) {
            Some(rewritten) => {
                if rewritten.running() {
                    tracing::info!("ComfyUI is running but was not recorded, owner unknown");
                } else {
                    tracing::info!(
                        owner = ?record.owner().map(Owner::as_str),
                        "ComfyUI not reachable past grace period, resetting status",
                    );
                }
                save_logged(store, &rewritten).await;
                rewritten
            }
            None => record,
        }
    }
}

/// Read the stored record, treating absence and errors as "stopped".
async fn load_or_default(store: &dyn RecordStore) -> OwnershipRecord {
    match store.load().await {
        Ok(Some(record)) => record,
        Ok(None) => OwnershipRecord::stopped(),
        Err(e) => {
            tracing::warn!(store = %store.describe(), error = %e, "Failed to read status, using defaults");
            OwnershipRecord::stopped()
        }
    }
}

async fn save_logged(store: &dyn RecordStore, record: &OwnershipRecord) {
    if let Err(e) = store.save(record).await {
        tracing::error!(store = %store.describe(), error = %e, "Failed to write status");
    }
}
