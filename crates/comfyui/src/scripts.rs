//! Script-driven ComfyUI lifecycle.
//!
//! The actual GPU process is started and stopped by shell scripts that
//! live next to the server:
//!
//! | Script                | Purpose                                   |
//! |-----------------------|-------------------------------------------|
//! | `start_comfyui.sh`    | launch ComfyUI for a user (`$1` = user)   |
//! | `stop_comfyui.sh`     | stop ComfyUI                              |
//! | `Download_models.py`  | fetch model weights (long running)        |
//!
//! Every action spawns the child and returns at once. A background task
//! waits for the child and logs how it went.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use podkeeper_core::lifecycle::{LifecycleAction, LifecycleError};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

pub const START_SCRIPT: &str = "start_comfyui.sh";
pub const STOP_SCRIPT: &str = "stop_comfyui.sh";
pub const DOWNLOAD_SCRIPT: &str = "Download_models.py";

/// Process pattern handed to `pkill -f` when no stop script exists.
pub const DEFAULT_KILL_PATTERN: &str = "main.py --listen";

/// Runs the ComfyUI scripts found in one directory.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    scripts_dir: PathBuf,
    kill_pattern: String,
    download_log: PathBuf,
}

impl ScriptRunner {
    /// * `scripts_dir`  - directory holding the scripts listed above.
    /// * `kill_pattern` - `pkill -f` pattern used when the stop script is absent.
    /// * `download_log` - file the model download output is appended to.
    pub fn new(
        scripts_dir: impl Into<PathBuf>,
        kill_pattern: impl Into<String>,
        download_log: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
            kill_pattern: kill_pattern.into(),
            download_log: download_log.into(),
        }
    }

    pub fn script_path(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    fn existing_script(&self, name: &str) -> Result<PathBuf, LifecycleError> {
        let path = self.script_path(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LifecycleError::ScriptNotFound(path))
        }
    }

    /// Start the model download script in the background.
    ///
    /// Output is appended to the download log so `/logs/model_downloads`
    /// can follow it. Returns [`LifecycleError::ScriptNotFound`] when the
    /// script is missing.
    pub async fn download_models(&self) -> Result<JoinHandle<()>, LifecycleError> {
        let script = self.existing_script(DOWNLOAD_SCRIPT)?;

        let mut command = Command::new("python3");
        command.arg(&script);
        match open_log(&self.download_log).await {
            Ok((stdout, stderr)) => {
                command.stdout(stdout).stderr(stderr);
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.download_log.display(),
                    error = %e,
                    "Cannot open download log, discarding output",
                );
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        tracing::info!(script = %script.display(), "Starting model download");
        let child = spawn(&mut command, "python3")?;
        Ok(tokio::spawn(wait_logged("setup", child)))
    }
}

impl LifecycleAction for ScriptRunner {
    fn launch(&self, user: &str) -> Result<JoinHandle<()>, LifecycleError> {
        let script = self.existing_script(START_SCRIPT)?;

        // Inherited stdio: the script backgrounds ComfyUI, which would
        // otherwise hold a captured pipe open for its whole lifetime.
        let mut command = Command::new("bash");
        command
            .arg(&script)
            .arg(user)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        tracing::info!(user, script = %script.display(), "Running start script");
        let child = spawn(&mut command, "bash")?;
        Ok(tokio::spawn(wait_logged("start", child)))
    }

    fn terminate(&self) -> JoinHandle<()> {
        let script = self.script_path(STOP_SCRIPT);
        let (mut command, program) = if script.is_file() {
            tracing::info!(script = %script.display(), "Running stop script");
            let mut command = Command::new("bash");
            command.arg(&script);
            (command, "bash")
        } else {
            tracing::warn!(
                path = %script.display(),
                pattern = %self.kill_pattern,
                "Stop script not found, attempting direct kill",
            );
            let mut command = Command::new("pkill");
            command.arg("-f").arg(&self.kill_pattern);
            (command, "pkill")
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match spawn(&mut command, program) {
            Ok(child) => tokio::spawn(wait_captured("stop", child)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to stop ComfyUI");
                tokio::spawn(async {})
            }
        }
    }
}

fn spawn(command: &mut Command, program: &str) -> Result<Child, LifecycleError> {
    command.spawn().map_err(|source| LifecycleError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Open `path` for appending twice (stdout + stderr), creating parents.
async fn open_log(path: &Path) -> std::io::Result<(std::fs::File, std::fs::File)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let stdout = file.into_std().await;
    let stderr = stdout.try_clone()?;
    Ok((stdout, stderr))
}

fn log_exit(action: &'static str, status: ExitStatus) {
    if status.success() {
        tracing::info!(action, "Script finished");
    } else {
        tracing::error!(action, exit_code = status.code().unwrap_or(-1), "Script failed");
    }
}

async fn wait_logged(action: &'static str, mut child: Child) {
    match child.wait().await {
        Ok(status) => log_exit(action, status),
        Err(e) => tracing::error!(action, error = %e, "Script wait failed"),
    }
}

async fn wait_captured(action: &'static str, child: Child) {
    match child.wait_with_output().await {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stdout.trim().is_empty() {
                tracing::info!(action, stdout = %stdout.trim(), "Script output");
            }
            if !stderr.trim().is_empty() {
                tracing::warn!(action, stderr = %stderr.trim(), "Script stderr");
            }
            log_exit(action, output.status);
        }
        Err(e) => tracing::error!(action, error = %e, "Script wait failed"),
    }
}
