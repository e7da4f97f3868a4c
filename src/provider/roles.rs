// src/provider/roles.rs - Role-based model assignment

use serde::{Deserialize, Serialize};

use crate::infra::config::{Config, Prompts, RoleConfig};

/// The three model-backed roles in the iteration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Planner,
    Coder,
    Reviewer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Coder => "coder",
            AgentRole::Reviewer => "reviewer",
        }
    }

    pub fn system_prompt<'a>(&self, prompts: &'a Prompts) -> &'a str {
        match self {
            AgentRole::Planner => &prompts.planner,
            AgentRole::Coder => &prompts.coder,
            AgentRole::Reviewer => &prompts.reviewer,
        }
    }

    fn overrides<'a>(&self, config: &'a Config) -> &'a RoleConfig {
        match self {
            AgentRole::Planner => &config.roles.planner,
            AgentRole::Coder => &config.roles.coder,
            AgentRole::Reviewer => &config.roles.reviewer,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved model settings for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl RoleSettings {
    /// Per-role values win; model and temperature fall back to `[llm]`.
    /// `max_tokens` has no base value.
    pub fn resolve(config: &Config, role: AgentRole) -> Self {
        let role_cfg = role.overrides(config);
        Self {
            model: role_cfg
                .model
                .clone()
                .unwrap_or_else(|| config.llm.model.clone()),
            temperature: role_cfg.temperature.unwrap_or(config.llm.temperature),
            max_tokens: role_cfg.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_falls_back_to_llm() {
        let config = Config::default();
        let settings = RoleSettings::resolve(&config, AgentRole::Planner);
        assert_eq!(
            settings,
            RoleSettings {
                model: "gemini-1.5-flash".into(),
                temperature: 0.2,
                max_tokens: None,
            }
        );
    }

    #[test]
    fn test_resolve_role_override() {
        let mut config = Config::default();
        config.roles.coder = RoleConfig {
            model: Some("gemini-2.5-pro".into()),
            temperature: None,
            max_tokens: Some(8192),
        };
        let coder = RoleSettings::resolve(&config, AgentRole::Coder);
        assert_eq!(coder.model, "gemini-2.5-pro");
        assert!((coder.temperature - 0.2).abs() < 0.001);
        assert_eq!(coder.max_tokens, Some(8192));

        // Other roles are unaffected
        let reviewer = RoleSettings::resolve(&config, AgentRole::Reviewer);
        assert_eq!(reviewer.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_system_prompt_lookup() {
        let prompts = Prompts {
            planner: "P".into(),
            coder: "C".into(),
            reviewer: String::new(),
        };
        assert_eq!(AgentRole::Planner.system_prompt(&prompts), "P");
        assert_eq!(AgentRole::Coder.system_prompt(&prompts), "C");
        assert_eq!(AgentRole::Reviewer.system_prompt(&prompts), "");
    }

    #[test]
    fn test_role_display() {
        let names: Vec<String> = [AgentRole::Planner, AgentRole::Coder, AgentRole::Reviewer]
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(names, vec!["planner", "coder", "reviewer"]);
    }
}
