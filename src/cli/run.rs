// src/cli/run.rs - Default command: run the agent loop

use std::path::Path;
use std::sync::Arc;

use super::Cli;
use crate::core::controller::Controller;
use crate::core::state::{AgentState, RunSummary};
use crate::core::steps::Steps;
use crate::infra::config::{load_or_default, Config, Prompts, RolesConfig};
use crate::provider::gateway::RoleGateways;
use crate::sandbox::SandboxRunner;

/// Load config, prompts and per-role settings, then apply CLI overrides.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<(Config, Prompts)> {
    let mut config = Config::load_or_default(Path::new(&cli.config))?;
    let agents: RolesConfig = load_or_default(Path::new(&cli.agents))?;
    config.merge_roles(&agents);
    config.apply_overrides(&cli.overrides());
    config.validate()?;

    let prompts = Prompts::load_or_default(Path::new(&cli.prompts))?;
    Ok((config, prompts))
}

/// Run the full loop with the Gemini backend and report the outcome.
pub async fn run_agent(cli: &Cli) -> anyhow::Result<RunSummary> {
    let (config, prompts) = resolve_config(cli)?;

    // Fails here, before any step, when the credential is missing
    let gateways = RoleGateways::gemini(&config)?;
    let runner = SandboxRunner::new(config.agent.interpreter.clone());

    let state = AgentState::new(Arc::new(config));
    let mut controller = Controller::new(Steps::new(gateways, prompts, runner));
    if !cli.quiet {
        controller = controller.with_progress(super::progress::terminal_progress());
    }

    let final_state = controller.run(state).await?;
    let summary = final_state.summary();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Agent finished.");
        println!("Iterations: {}", summary.iterations);
        println!("Stop: {}", summary.stop);
    }

    Ok(summary)
}
