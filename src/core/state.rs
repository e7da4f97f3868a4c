// src/core/state.rs - Per-run state record threaded through every step
//
// One `AgentState` exists per run. The controller owns it and lends it
// mutably to each step in turn; `history` is append-only.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::Phase;
use crate::infra::config::Config;
use crate::sandbox::ExecutionResult;

/// One record per step invocation, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum HistoryEvent {
    Plan { plan: String },
    CodeGen,
    Execute { result: String },
    Review { stop: bool },
}

impl HistoryEvent {
    pub fn phase(&self) -> Phase {
        match self {
            HistoryEvent::Plan { .. } => Phase::Plan,
            HistoryEvent::CodeGen => Phase::CodeGen,
            HistoryEvent::Execute { .. } => Phase::Execute,
            HistoryEvent::Review { .. } => Phase::Review,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentState {
    /// Resolved settings, read-only for the whole run.
    pub config: Arc<Config>,
    pub input_file: String,
    pub target_column: String,
    pub problem_type: String,
    /// Latest planning text; the review step also writes here.
    pub plan: Option<String>,
    pub generated_code: Option<String>,
    pub execution_result: Option<String>,
    pub last_run: Option<ExecutionResult>,
    history: Vec<HistoryEvent>,
    pub iter_count: u32,
    pub max_iters: u32,
    /// Unset until the first review.
    pub stop: Option<bool>,
}

impl AgentState {
    /// Fresh state with task fields taken from the config and zero counters.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            input_file: config.input_file(),
            target_column: config.target_column(),
            problem_type: config.problem_type(),
            max_iters: config.agent.max_iters,
            config,
            plan: None,
            generated_code: None,
            execution_result: None,
            last_run: None,
            history: Vec::new(),
            iter_count: 0,
            stop: None,
        }
    }

    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    pub fn record(&mut self, event: HistoryEvent) {
        self.history.push(event);
    }

    pub fn stopped(&self) -> bool {
        self.stop.unwrap_or(false)
    }

    /// Context block shared by every model-facing prompt.
    pub fn format_context(&self) -> String {
        let mut lines = vec![
            format!("input_file: {}", self.input_file),
            format!("target_column: {}", self.target_column),
            format!("problem_type: {}", self.problem_type),
            format!("iter_count: {}", self.iter_count),
        ];
        if let Some(plan) = self.plan.as_deref().filter(|p| !p.is_empty()) {
            lines.push(format!("plan: {}", plan));
        }
        if let Some(result) = self.execution_result.as_deref().filter(|r| !r.is_empty()) {
            lines.push(format!("execution_result: {}", result));
        }
        lines.join("\n")
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            iterations: self.iter_count,
            stop: self.stopped(),
            plan: self.plan.clone(),
            execution_result: self.execution_result.clone(),
            last_run: self.last_run.clone(),
            history: self.history.clone(),
        }
    }
}

/// Serializable view of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub iterations: u32,
    pub stop: bool,
    pub plan: Option<String>,
    pub execution_result: Option<String>,
    pub last_run: Option<ExecutionResult>,
    pub history: Vec<HistoryEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> Arc<Config> {
        let mut c = Config::default();
        c.task.input_file = Some("data/train.csv".into());
        c.task.target_column = Some("y".into());
        c.task.problem_type = Some("regression".into());
        c.agent.max_iters = 3;
        Arc::new(c)
    }

    #[test]
    fn test_new_state_from_config() {
        let state = AgentState::new(config());
        assert_eq!(state.input_file, "data/train.csv");
        assert_eq!(state.target_column, "y");
        assert_eq!(state.problem_type, "regression");
        assert_eq!(state.max_iters, 3);
        assert_eq!(state.iter_count, 0);
        assert!(state.history().is_empty());
        assert!(state.stop.is_none());
        assert!(!state.stopped());
    }

    #[test]
    fn test_context_without_optional_fields() {
        let state = AgentState::new(config());
        assert_eq!(
            state.format_context(),
            "input_file: data/train.csv\ntarget_column: y\nproblem_type: regression\niter_count: 0"
        );
    }

    #[test]
    fn test_context_includes_plan_and_result() {
        let mut state = AgentState::new(config());
        state.plan = Some("fit a GBM".into());
        state.execution_result = Some("exit_code=0 duration=1.5".into());
        state.iter_count = 1;
        let ctx = state.format_context();
        assert!(ctx.contains("iter_count: 1"));
        assert!(ctx.ends_with("plan: fit a GBM\nexecution_result: exit_code=0 duration=1.5"));
    }

    #[test]
    fn test_history_event_json_shape() {
        let events = vec![
            HistoryEvent::Plan { plan: "p".into() },
            HistoryEvent::CodeGen,
            HistoryEvent::Execute { result: "r".into() },
            HistoryEvent::Review { stop: true },
        ];
        let json = serde_json::to_value(&events).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "step": "plan", "plan": "p" },
                { "step": "code_gen" },
                { "step": "execute", "result": "r" },
                { "step": "review", "stop": true },
            ])
        );
        assert_eq!(events[1].phase(), Phase::CodeGen);
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut state = AgentState::new(config());
        state.record(HistoryEvent::CodeGen);
        state.record(HistoryEvent::Review { stop: false });
        let phases: Vec<Phase> = state.history().iter().map(|e| e.phase()).collect();
        assert_eq!(phases, vec![Phase::CodeGen, Phase::Review]);
    }
}
