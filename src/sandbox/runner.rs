// src/sandbox/runner.rs - Run a script as a child process with a wall-clock limit

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::{ExecutionError, ExecutionResult, SENTINEL_EXIT_CODE};
use crate::infra::errors::DataPilotError;

/// How long to keep draining both pipes after the child is gone. A detached
/// grandchild that inherited stdout can hold a pipe open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const SCRIPT_PREFIX: &str = "run_";
const SCRIPT_SUFFIX: &str = ".py";

/// Writes code to a fresh file in the working directory and runs it with the
/// configured interpreter.
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    interpreter: String,
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new("python3")
    }
}

type SharedBuf = Arc<Mutex<Vec<u8>>>;

impl SandboxRunner {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    /// Execute `code` inside `workdir`, killing it after `timeout_sec`.
    ///
    /// Non-zero exits, timeouts and a missing interpreter are reported in the
    /// returned `ExecutionResult`. Only failing to create the directory or
    /// write the script is an `Err`.
    pub async fn execute(
        &self,
        code: &str,
        workdir: &Path,
        timeout_sec: u64,
    ) -> Result<ExecutionResult, DataPilotError> {
        tokio::fs::create_dir_all(workdir).await?;

        let start = Instant::now();
        let script_path = write_script(code, workdir)?;
        tracing::debug!("Wrote {} bytes to {}", code.len(), script_path.display());

        let program = match which::which(&self.interpreter) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(interpreter = %self.interpreter, "Interpreter not found: {}", e);
                return Ok(spawn_failed(
                    script_path,
                    format!("interpreter '{}' not found: {}", self.interpreter, e),
                    start,
                ));
            }
        };

        let mut command = Command::new(&program);
        command
            .arg(&script_path)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down workers the script forked
        #[cfg(unix)]
        command.process_group(0);
        let spawned = command.spawn();

        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to spawn {}: {}", program.display(), e);
                return Ok(spawn_failed(
                    script_path,
                    format!("failed to spawn {}: {}", program.display(), e),
                    start,
                ));
            }
        };

        let (stdout_buf, stdout_task) = drain(child.stdout.take());
        let (stderr_buf, stderr_task) = drain(child.stderr.take());

        let limit = Duration::from_secs(timeout_sec);
        let waited = tokio::time::timeout(limit, child.wait()).await;
        let (exit_code, error) = match waited {
            Ok(status) => (status?.code().unwrap_or(SENTINEL_EXIT_CODE), None),
            Err(_) => {
                tracing::warn!(
                    script = %script_path.display(),
                    "Script exceeded {}s, killing",
                    timeout_sec
                );
                kill_process_group(&child);
                if let Err(e) = child.kill().await {
                    tracing::warn!("Kill failed: {}", e);
                }
                (SENTINEL_EXIT_CODE, Some(ExecutionError::Timeout))
            }
        };
        let duration_sec = round_millis(start.elapsed());

        finish_drains([stdout_task, stderr_task].into_iter().flatten().collect()).await;
        let stdout = into_string(&stdout_buf);
        let stderr = into_string(&stderr_buf);

        tracing::debug!(
            exit_code,
            duration_sec,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Script finished"
        );

        Ok(ExecutionResult {
            script_path,
            exit_code,
            stdout,
            stderr,
            duration_sec,
            error,
        })
    }
}

/// Create a uniquely named script file in `workdir`. The file is kept.
fn write_script(code: &str, workdir: &Path) -> Result<PathBuf, DataPilotError> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRIPT_PREFIX)
        .suffix(SCRIPT_SUFFIX)
        .tempfile_in(workdir)?;
    file.write_all(code.as_bytes())?;
    file.flush()?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

/// Copy a pipe into a shared buffer so partial output survives a kill.
fn drain<R>(pipe: Option<R>) -> (SharedBuf, Option<JoinHandle<()>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf: SharedBuf = Arc::new(Mutex::new(Vec::new()));
    let task = pipe.map(|mut pipe| {
        let buf = buf.clone();
        tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut b) = buf.lock() {
                            b.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        })
    });
    (buf, task)
}

/// Wait for all drain tasks under one shared `DRAIN_GRACE` deadline, then
/// abort whatever is still reading.
async fn finish_drains(mut tasks: Vec<JoinHandle<()>>) {
    let joined = tokio::time::timeout(DRAIN_GRACE, async {
        for task in tasks.iter_mut() {
            let _ = task.await;
        }
    })
    .await;
    if joined.is_err() {
        tracing::debug!("Pipe still open after grace period, keeping partial output");
        for task in &tasks {
            task.abort();
        }
    }
}

fn into_string(buf: &SharedBuf) -> String {
    let bytes = buf.lock().map(|b| b.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// SIGKILL every process in the child's group. The child leads its own group,
/// so its pid is the group id.
#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc != 0 {
            tracing::debug!(
                pid,
                "Process group kill failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &tokio::process::Child) {}

fn spawn_failed(script_path: PathBuf, message: String, start: Instant) -> ExecutionResult {
    ExecutionResult {
        script_path,
        exit_code: SENTINEL_EXIT_CODE,
        stdout: String::new(),
        stderr: message,
        duration_sec: round_millis(start.elapsed()),
        error: Some(ExecutionError::SpawnFailed),
    }
}

fn round_millis(d: Duration) -> f64 {
    (d.as_secs_f64() * 1000.0).round() / 1000.0
}
