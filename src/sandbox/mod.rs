// src/sandbox/mod.rs - Process-isolated execution of generated scripts
//
// This is a process boundary, not a security boundary. The script runs with
// the agent's own user, network access and filesystem permissions; only the
// script file itself is confined to the working directory. Harden with an
// OS-level jail (container, namespaces, seccomp) before running untrusted
// code on a shared machine.

pub mod runner;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use runner::SandboxRunner;

/// Exit code reported when the process was killed for exceeding its time limit
/// or never started.
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Why a run did not produce a normal exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionError {
    Timeout,
    SpawnFailed,
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionError::Timeout => write!(f, "timeout"),
            ExecutionError::SpawnFailed => write!(f, "spawn_failed"),
        }
    }
}

/// Raw outcome of one sandboxed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub script_path: PathBuf,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Seconds, rounded to millisecond precision.
    pub duration_sec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn timed_out(&self) -> bool {
        self.error == Some(ExecutionError::Timeout)
    }

    /// One-line summary stored in the run state.
    pub fn summary(&self) -> String {
        format!(
            "exit_code={} duration={}",
            self.exit_code, self.duration_sec
        )
    }
}
