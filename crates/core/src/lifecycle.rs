//! External lifecycle actions (launch / terminate).
//!
//! Both operations are fire-and-forget: they return as soon as the child
//! process has been submitted, handing back the [`JoinHandle`] of the task
//! that waits on it. Callers normally drop the handle (detaching the task);
//! only shutdown awaits it.

use std::path::PathBuf;

use tokio::task::JoinHandle;

/// Errors raised while submitting an external action.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The script backing the action does not exist.
    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    /// The child process could not be spawned.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait LifecycleAction: Send + Sync {
    /// Submit a launch of the external process on behalf of `user`.
    fn launch(&self, user: &str) -> Result<JoinHandle<()>, LifecycleError>;

    /// Submit a termination of the external process.
    ///
    /// Never fails from the caller's perspective; problems are logged by
    /// the returned task.
    fn terminate(&self) -> JoinHandle<()>;
}
