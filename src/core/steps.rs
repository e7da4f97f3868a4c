// src/core/steps.rs - The four step functions of the cycle
//
// Each step reads the state, may call a gateway or the sandbox, writes its
// fields and appends exactly one history event. Gateway errors propagate;
// an empty model reply leaves the target field untouched.

use super::state::{AgentState, HistoryEvent};
use super::types::Phase;
use crate::infra::config::Prompts;
use crate::infra::errors::DataPilotError;
use crate::provider::gateway::RoleGateways;
use crate::provider::roles::AgentRole;
use crate::sandbox::SandboxRunner;

/// Fixed name of the persisted copy of the latest generated program.
pub const PIPELINE_FILENAME: &str = "pipeline.py";

pub const EXECUTION_SKIPPED: &str = "Execution skipped (disabled or no code).";

const PLAN_INSTRUCTION: &str = "Return a concise analysis plan.";
const CODE_INSTRUCTION: &str = "Generate code for preprocessing and proxy training.";
const REVIEW_INSTRUCTION: &str = "Decide whether to iterate or stop.";

/// Step functions with their collaborators injected up front.
pub struct Steps {
    gateways: RoleGateways,
    prompts: Prompts,
    runner: SandboxRunner,
}

impl Steps {
    pub fn new(gateways: RoleGateways, prompts: Prompts, runner: SandboxRunner) -> Self {
        Self {
            gateways,
            prompts,
            runner,
        }
    }

    /// Dispatch one phase. The controller stops before `Phase::End`, which has
    /// no step.
    pub async fn run(&self, phase: Phase, state: &mut AgentState) -> Result<(), DataPilotError> {
        match phase {
            Phase::Plan => self.plan_step(state).await,
            Phase::CodeGen => self.code_gen_step(state).await,
            Phase::Execute => self.execute_step(state).await,
            Phase::Review => self.review_step(state).await,
            Phase::End => unreachable!("no step runs in the end phase"),
        }
    }

    async fn ask(
        &self,
        role: AgentRole,
        state: &AgentState,
        instruction: &str,
    ) -> Result<String, DataPilotError> {
        let user_prompt = format!("Context:\n{}\n\n{}", state.format_context(), instruction);
        self.gateways
            .get(role)
            .generate(role.system_prompt(&self.prompts), &user_prompt)
            .await
    }

    pub async fn plan_step(&self, state: &mut AgentState) -> Result<(), DataPilotError> {
        let response = self.ask(AgentRole::Planner, state, PLAN_INSTRUCTION).await?;
        if !response.is_empty() {
            state.plan = Some(response);
        }
        tracing::info!(iter = state.iter_count, "plan step done");
        let plan = state.plan.clone().unwrap_or_default();
        state.record(HistoryEvent::Plan { plan });
        Ok(())
    }

    pub async fn code_gen_step(&self, state: &mut AgentState) -> Result<(), DataPilotError> {
        let response = self.ask(AgentRole::Coder, state, CODE_INSTRUCTION).await?;
        if !response.is_empty() {
            state.generated_code = Some(response);
        }
        tracing::info!(
            iter = state.iter_count,
            code_chars = state.generated_code.as_deref().map_or(0, str::len),
            "code_gen step done"
        );
        state.record(HistoryEvent::CodeGen);
        Ok(())
    }

    pub async fn execute_step(&self, state: &mut AgentState) -> Result<(), DataPilotError> {
        let config = state.config.clone();
        let scripts_dir = &config.paths.generated_scripts;
        tokio::fs::create_dir_all(scripts_dir).await?;

        let code = state.generated_code.clone().filter(|c| !c.is_empty());

        if let Some(ref code) = code {
            let pipeline_path = scripts_dir.join(PIPELINE_FILENAME);
            tokio::fs::write(&pipeline_path, code).await?;
            tracing::debug!("Saved generated code to {}", pipeline_path.display());
        }

        let execution_result = match code {
            Some(ref code) if config.agent.execute_enabled => {
                let result = self
                    .runner
                    .execute(code, scripts_dir, config.agent.timeout_sec)
                    .await?;
                let summary = result.summary();
                state.last_run = Some(result);
                summary
            }
            _ => EXECUTION_SKIPPED.to_string(),
        };
        state.execution_result = Some(execution_result.clone());

        state.iter_count += 1;
        tracing::info!(iter = state.iter_count, result = %execution_result, "execute step done");
        state.record(HistoryEvent::Execute {
            result: execution_result,
        });
        Ok(())
    }

    pub async fn review_step(&self, state: &mut AgentState) -> Result<(), DataPilotError> {
        let response = self.ask(AgentRole::Reviewer, state, REVIEW_INSTRUCTION).await?;
        if !response.is_empty() {
            state.plan = Some(response);
        }
        // Iteration count alone decides; once stopped, stays stopped
        let stop = state.stopped() || state.iter_count >= state.max_iters;
        state.stop = Some(stop);
        tracing::info!(iter = state.iter_count, stop, "review step done");
        state.record(HistoryEvent::Review { stop });
        Ok(())
    }
}
