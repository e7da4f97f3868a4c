// src/cli/mod.rs - CLI definition (clap derive)

pub mod progress;
pub mod run;

use clap::Parser;

use crate::infra::config::{
    RunOverrides, DEFAULT_AGENTS_PATH, DEFAULT_CONFIG_PATH, DEFAULT_PROMPTS_PATH,
};

#[derive(Parser, Debug)]
#[command(
    name = "datapilot",
    about = "Iterative LLM data-analysis agent: plan, generate, execute, review",
    version
)]
pub struct Cli {
    /// Main config file (TOML, or YAML by extension)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// System prompts file (planner/coder/reviewer)
    #[arg(long, default_value = DEFAULT_PROMPTS_PATH)]
    pub prompts: String,

    /// Per-role model settings file
    #[arg(long, default_value = DEFAULT_AGENTS_PATH)]
    pub agents: String,

    /// Dataset to analyze
    #[arg(long)]
    pub input_file: Option<String>,

    /// Column to predict
    #[arg(long)]
    pub target_column: Option<String>,

    /// e.g. classification, regression
    #[arg(long)]
    pub problem_type: Option<String>,

    /// Number of plan/generate/execute/review cycles
    #[arg(long)]
    pub max_iters: Option<u32>,

    /// Run generated code (--no-execute only writes it to disk)
    #[arg(long, overrides_with = "no_execute")]
    pub execute: bool,

    #[arg(long = "no-execute", overrides_with = "execute")]
    pub no_execute: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose logging (info level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the final run summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// `Some(true)` / `Some(false)` only when a flag was given.
    pub fn execute_enabled(&self) -> Option<bool> {
        match (self.execute, self.no_execute) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            input_file: self.input_file.clone(),
            target_column: self.target_column.clone(),
            problem_type: self.problem_type.clone(),
            max_iters: self.max_iters,
            execute_enabled: self.execute_enabled(),
        }
    }
}
