// src/core/types.rs - Core domain types

use serde::{Deserialize, Serialize};

/// Position in the plan -> code_gen -> execute -> review cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    CodeGen,
    Execute,
    Review,
    End,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::CodeGen => "code_gen",
            Phase::Execute => "execute",
            Phase::Review => "review",
            Phase::End => "end",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the single decision point after review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    End,
}

/// Progress events emitted by the controller for real-time display.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    CycleStart { cycle: u32, max_iters: u32 },
    StepDone { cycle: u32, phase: Phase },
    Complete { iterations: u32, stop: bool },
}
