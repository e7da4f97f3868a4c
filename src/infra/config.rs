// src/infra/config.rs - Configuration loading (TOML, with YAML accepted by extension)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::errors::DataPilotError;

pub const DEFAULT_CONFIG_PATH: &str = "configs/config.toml";
pub const DEFAULT_PROMPTS_PATH: &str = "configs/prompts.toml";
pub const DEFAULT_AGENTS_PATH: &str = "configs/agents.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Top-level shortcut; takes precedence over `task.input_file`.
    /// `Some(None)` is a key present with a null value, which still wins.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub input_file: Option<Option<String>>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub target_column: Option<Option<String>>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<Option<String>>,

    #[serde(default)]
    pub task: TaskConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub input_file: Option<String>,
    pub target_column: Option<String>,
    pub problem_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iters: u32,
    pub execute_enabled: bool,
    pub timeout_sec: u64,
    /// Program used to run generated scripts.
    pub interpreter: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iters: 1,
            execute_enabled: true,
            timeout_sec: 300,
            interpreter: "python3".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub generated_scripts: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            generated_scripts: PathBuf::from("generated/scripts"),
        }
    }
}

/// Base model settings shared by every role unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".into(),
            temperature: 0.2,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl RoleConfig {
    /// Field-wise overlay: values set in `other` win.
    fn overlay(&self, other: &RoleConfig) -> RoleConfig {
        RoleConfig {
            model: other.model.clone().or_else(|| self.model.clone()),
            temperature: other.temperature.or(self.temperature),
            max_tokens: other.max_tokens.or(self.max_tokens),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RolesConfig {
    #[serde(default)]
    pub planner: RoleConfig,
    #[serde(default)]
    pub coder: RoleConfig,
    #[serde(default)]
    pub reviewer: RoleConfig,
}

/// System prompts, one per role. Missing entries are empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
    pub planner: String,
    pub coder: String,
    pub reviewer: String,
}

impl Prompts {
    pub fn load_or_default(path: &Path) -> Result<Self, DataPilotError> {
        load_or_default(path)
    }
}

/// Values supplied on the command line. `None` leaves the config untouched.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub input_file: Option<String>,
    pub target_column: Option<String>,
    pub problem_type: Option<String>,
    pub max_iters: Option<u32>,
    pub execute_enabled: Option<bool>,
}

impl Config {
    /// Load config from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, DataPilotError> {
        load_or_default(path)
    }

    pub fn load_from(path: &Path) -> Result<Self, DataPilotError> {
        load_file(path)
    }

    /// Overlay a separate agents file (per-role model settings) onto `[roles]`.
    pub fn merge_roles(&mut self, agents: &RolesConfig) {
        self.roles = RolesConfig {
            planner: self.roles.planner.overlay(&agents.planner),
            coder: self.roles.coder.overlay(&agents.coder),
            reviewer: self.roles.reviewer.overlay(&agents.reviewer),
        };
    }

    pub fn apply_overrides(&mut self, overrides: &RunOverrides) {
        if let Some(ref input_file) = overrides.input_file {
            self.input_file = Some(Some(input_file.clone()));
            self.task.input_file = Some(input_file.clone());
        }
        if let Some(ref target_column) = overrides.target_column {
            self.task.target_column = Some(target_column.clone());
            // the top-level key would otherwise shadow the override
            self.target_column = None;
        }
        if let Some(ref problem_type) = overrides.problem_type {
            self.task.problem_type = Some(problem_type.clone());
            self.problem_type = None;
        }
        if let Some(max_iters) = overrides.max_iters {
            self.agent.max_iters = max_iters;
        }
        if let Some(execute_enabled) = overrides.execute_enabled {
            self.agent.execute_enabled = execute_enabled;
        }
    }

    pub fn input_file(&self) -> String {
        task_value(self.input_file.as_ref(), self.task.input_file.as_deref())
    }

    pub fn target_column(&self) -> String {
        task_value(
            self.target_column.as_ref(),
            self.task.target_column.as_deref(),
        )
    }

    pub fn problem_type(&self) -> String {
        task_value(
            self.problem_type.as_ref(),
            self.task.problem_type.as_deref(),
        )
    }

    pub fn validate(&self) -> Result<(), DataPilotError> {
        if self.agent.timeout_sec == 0 {
            return Err(DataPilotError::Config(
                "agent.timeout_sec must be at least 1".into(),
            ));
        }
        if self.agent.interpreter.trim().is_empty() {
            return Err(DataPilotError::Config(
                "agent.interpreter must not be empty".into(),
            ));
        }
        if !self.llm.temperature.is_finite() {
            return Err(DataPilotError::Config(
                "llm.temperature must be a finite number".into(),
            ));
        }
        Ok(())
    }
}

/// A top-level key, once present, shadows `task.*` even when it is null.
fn task_value(top_level: Option<&Option<String>>, task: Option<&str>) -> String {
    match top_level {
        Some(value) => value.clone().unwrap_or_default(),
        None => task.unwrap_or_default().to_string(),
    }
}

/// Marks a key that appears in the file, so `key: null` becomes `Some(None)`
/// instead of collapsing into a missing key.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parse a config-like file, choosing the format by extension.
pub fn load_file<T: DeserializeOwned + Default>(path: &Path) -> Result<T, DataPilotError> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    let parsed = if is_yaml(path) {
        serde_yml::from_str(&content)
            .map_err(|e| DataPilotError::Config(format!("{}: {}", path.display(), e)))?
    } else {
        toml::from_str(&content)
            .map_err(|e| DataPilotError::Config(format!("{}: {}", path.display(), e)))?
    };
    Ok(parsed)
}

pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, DataPilotError> {
    if path.exists() {
        tracing::debug!("Loading {}", path.display());
        load_file(path)
    } else {
        tracing::debug!("{} not found, using defaults", path.display());
        Ok(T::default())
    }
}
