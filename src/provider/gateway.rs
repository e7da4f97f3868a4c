// src/provider/gateway.rs - Single-call text generation per role

use std::sync::Arc;

use super::google::GoogleProvider;
use super::roles::{AgentRole, RoleSettings};
use super::{ChatRequest, Message, ModelProvider, StopReason};
use crate::infra::config::Config;
use crate::infra::errors::DataPilotError;

/// Wraps one provider call: system + user prompt in, trimmed text out.
///
/// No retries. Backend errors are returned to the caller as-is.
pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    role: AgentRole,
    settings: RoleSettings,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn ModelProvider>, role: AgentRole, settings: RoleSettings) -> Self {
        Self {
            provider,
            role,
            settings,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn settings(&self) -> &RoleSettings {
        &self.settings
    }

    /// Generate text. Returns `""` when the backend yields no text.
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, DataPilotError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![Message::user(user_prompt)],
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            system: Some(system_prompt.to_string()),
        };

        tracing::debug!(
            role = %self.role,
            provider = self.provider.id(),
            model = %self.settings.model,
            prompt_chars = user_prompt.len(),
            "Sending generation request",
        );

        let response = self.provider.chat(request).await?;
        match response.stop_reason {
            StopReason::MaxTokens => tracing::warn!(
                role = %self.role,
                max_tokens = ?self.settings.max_tokens,
                "Reply hit the token limit and is likely truncated"
            ),
            StopReason::Safety => {
                tracing::warn!(role = %self.role, "Reply was cut by the safety filter")
            }
            StopReason::EndTurn | StopReason::Unknown => {}
        }
        Ok(response.content.trim().to_string())
    }
}

/// One gateway per role, all sharing a provider.
pub struct RoleGateways {
    pub planner: ModelGateway,
    pub coder: ModelGateway,
    pub reviewer: ModelGateway,
}

impl RoleGateways {
    pub fn from_provider(config: &Config, provider: Arc<dyn ModelProvider>) -> Self {
        let gateway = |role: AgentRole| {
            ModelGateway::new(provider.clone(), role, RoleSettings::resolve(config, role))
        };
        Self {
            planner: gateway(AgentRole::Planner),
            coder: gateway(AgentRole::Coder),
            reviewer: gateway(AgentRole::Reviewer),
        }
    }

    /// Gemini-backed gateways. The credential is checked here, once,
    /// so a missing key aborts before the first step runs.
    pub fn gemini(config: &Config) -> Result<Self, DataPilotError> {
        let provider = GoogleProvider::from_credentials(config.llm.api_key.as_deref())?;
        Ok(Self::from_provider(config, Arc::new(provider)))
    }

    pub fn get(&self, role: AgentRole) -> &ModelGateway {
        match role {
            AgentRole::Planner => &self.planner,
            AgentRole::Coder => &self.coder,
            AgentRole::Reviewer => &self.reviewer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoProvider {
        reply: String,
        stop_reason: StopReason,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ModelProvider for EchoProvider {
        fn id(&self) -> &str {
            "echo"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, DataPilotError> {
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse {
                content: self.reply.clone(),
                stop_reason: self.stop_reason.clone(),
                ..Default::default()
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ModelProvider for FailingProvider {
        fn id(&self) -> &str {
            "failing"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, DataPilotError> {
            Err(DataPilotError::Provider {
                provider: "failing".into(),
                message: "connection reset".into(),
            })
        }
    }

    fn echo(reply: &str) -> Arc<EchoProvider> {
        Arc::new(EchoProvider {
            reply: reply.into(),
            stop_reason: StopReason::EndTurn,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_generate_trims_output() {
        let provider = echo("  \n the plan \n ");
        let gw = ModelGateway::new(
            provider.clone(),
            AgentRole::Planner,
            RoleSettings::resolve(&Config::default(), AgentRole::Planner),
        );
        let text = gw.generate("sys", "user").await.unwrap();
        assert_eq!(text, "the plan");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gemini-1.5-flash");
        assert_eq!(seen[0].system.as_deref(), Some("sys"));
        assert_eq!(seen[0].messages[0].content, "user");
        assert_eq!(seen[0].max_tokens, None);
    }

    #[tokio::test]
    async fn test_generate_whitespace_only_is_empty() {
        let gw = ModelGateway::new(
            echo("   "),
            AgentRole::Coder,
            RoleSettings::resolve(&Config::default(), AgentRole::Coder),
        );
        assert_eq!(gw.generate("", "u").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_truncated_reply_is_still_returned() {
        let provider = Arc::new(EchoProvider {
            reply: "import pandas as".into(),
            stop_reason: StopReason::MaxTokens,
            seen: Mutex::new(Vec::new()),
        });
        let gw = ModelGateway::new(
            provider,
            AgentRole::Coder,
            RoleSettings::resolve(&Config::default(), AgentRole::Coder),
        );
        assert_eq!(gw.generate("", "u").await.unwrap(), "import pandas as");
    }

    #[tokio::test]
    async fn test_generate_propagates_backend_error() {
        let gw = ModelGateway::new(
            Arc::new(FailingProvider),
            AgentRole::Reviewer,
            RoleSettings::resolve(&Config::default(), AgentRole::Reviewer),
        );
        let err = gw.generate("", "u").await.unwrap_err();
        assert!(matches!(err, DataPilotError::Provider { .. }));
    }

    #[test]
    fn test_role_gateways_use_role_settings() {
        let mut config = Config::default();
        config.roles.reviewer.model = Some("gemini-2.5-pro".into());
        let gws = RoleGateways::from_provider(&config, echo("x"));
        assert_eq!(gws.get(AgentRole::Reviewer).settings().model, "gemini-2.5-pro");
        assert_eq!(gws.get(AgentRole::Planner).settings().model, "gemini-1.5-flash");
        assert_eq!(gws.get(AgentRole::Coder).role(), AgentRole::Coder);
    }

    #[test]
    fn test_gemini_with_explicit_key_constructs() {
        let mut config = Config::default();
        config.llm.api_key = Some("test-key".into());
        assert!(RoleGateways::gemini(&config).is_ok());
    }
}
