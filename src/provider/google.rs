// src/provider/google.rs - Google Generative AI (Gemini) provider

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider, Role, StopReason, TokenUsage};
use crate::infra::errors::DataPilotError;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

pub struct GoogleProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }

    /// Build a provider from an explicit key or the process environment.
    ///
    /// Fails fast with `MissingCredential` when no key can be found.
    pub fn from_credentials(explicit: Option<&str>) -> Result<Self, DataPilotError> {
        let key = resolve_api_key(explicit, |name| std::env::var(name).ok())?;
        Ok(Self::new(key))
    }

    fn provider_error(&self, message: impl Into<String>) -> DataPilotError {
        DataPilotError::Provider {
            provider: "google".into(),
            message: message.into(),
        }
    }
}

/// Resolve the API key: explicit config value first, then each env var.
/// Blank values count as absent.
pub fn resolve_api_key(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, DataPilotError> {
    let from_env = || {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|v| !v.trim().is_empty())
    };

    explicit
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .or_else(from_env)
        .ok_or_else(|| DataPilotError::MissingCredential {
            provider: "google".into(),
            env_vars: API_KEY_ENV_VARS.join(" or "),
        })
}

/// Build the Gemini request body from a ChatRequest.
pub fn build_request_body(request: &ChatRequest) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
            };
            serde_json::json!({
                "role": role,
                "parts": [{ "text": m.content }],
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
    });

    // An empty system prompt is sent as no system instruction at all
    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        body["system_instruction"] = serde_json::json!({
            "parts": [{ "text": system }],
        });
    }

    let mut gen_config = serde_json::json!({});
    if let Some(max_tokens) = request.max_tokens {
        gen_config["maxOutputTokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        gen_config["temperature"] = serde_json::json!(temp);
    }
    if gen_config != serde_json::json!({}) {
        body["generationConfig"] = gen_config;
    }

    body
}

/// Extract text, usage and finish reason from a `generateContent` response.
/// Missing candidates or parts yield empty content rather than an error.
pub fn parse_response(resp: &serde_json::Value) -> ChatResponse {
    let content: String = resp["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default();

    let usage = TokenUsage {
        input_tokens: resp["usageMetadata"]["promptTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32,
        output_tokens: resp["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32,
    };

    let stop_reason = match resp["candidates"][0]["finishReason"].as_str() {
        Some("STOP") => StopReason::EndTurn,
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some("SAFETY") => StopReason::Safety,
        _ => StopReason::Unknown,
    };

    ChatResponse {
        content,
        usage,
        stop_reason,
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, DataPilotError> {
        let body = build_request_body(&request);

        // The key travels in a header so it never shows up in a URL
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_error(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(self.provider_error(format!("HTTP {}: {}", status, error_body)));
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                self.provider_error(format!("Failed to parse response: {}", e.without_url()))
            })?;

        let parsed = parse_response(&resp);
        tracing::debug!(
            model = %request.model,
            tokens = parsed.usage.total(),
            "Gemini response received",
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_resolve_api_key_explicit_wins() {
        let key = resolve_api_key(Some("cfg-key"), env(&[("GEMINI_API_KEY", "env")])).unwrap();
        assert_eq!(key, "cfg-key");
    }

    #[test]
    fn test_resolve_api_key_env_order() {
        let key = resolve_api_key(
            None,
            env(&[("GEMINI_API_KEY", "gemini"), ("GOOGLE_API_KEY", "google")]),
        )
        .unwrap();
        assert_eq!(key, "gemini");

        let key = resolve_api_key(None, env(&[("GOOGLE_API_KEY", "google")])).unwrap();
        assert_eq!(key, "google");
    }

    #[test]
    fn test_resolve_api_key_blank_is_missing() {
        let err = resolve_api_key(Some("  "), env(&[("GEMINI_API_KEY", "")])).unwrap_err();
        assert!(matches!(err, DataPilotError::MissingCredential { .. }));
    }

    #[test]
    fn test_request_body_with_system_and_config() {
        let request = ChatRequest {
            model: "gemini-1.5-flash".into(),
            messages: vec![Message::user("Context: x")],
            max_tokens: Some(256),
            temperature: Some(0.2),
            system: Some("You plan.".into()),
        };
        let body = build_request_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Context: x");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "You plan.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert!(body["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_request_body_empty_system_omitted() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            system: Some(String::new()),
            ..Default::default()
        };
        let body = build_request_body(&request);
        assert!(body.get("system_instruction").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_parse_response_concatenates_parts() {
        let resp = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 3 }
        });
        let parsed = parse_response(&resp);
        assert_eq!(parsed.content, "Hello, world");
        assert_eq!(parsed.stop_reason, StopReason::EndTurn);
        assert_eq!(parsed.usage.total(), 15);
    }

    #[test]
    fn test_parse_response_no_candidates_is_empty() {
        let resp = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let parsed = parse_response(&resp);
        assert_eq!(parsed.content, "");
        assert_eq!(parsed.stop_reason, StopReason::Unknown);
    }

    #[test]
    fn test_parse_response_max_tokens() {
        let resp = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "import pandas as" }] },
                "finishReason": "MAX_TOKENS"
            }]
        });
        assert_eq!(parse_response(&resp).stop_reason, StopReason::MaxTokens);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        // Port 9 (discard) is closed on any sane test host
        let provider = GoogleProvider {
            base_url: "http://127.0.0.1:9/v1beta".into(),
            ..GoogleProvider::new("SECRET_KEY_123".into())
        };
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let err = provider.chat(request).await.unwrap_err();
        assert!(matches!(err, DataPilotError::Provider { .. }));
        let text = format!("{err} {err:?}");
        assert!(!text.contains("SECRET_KEY_123"), "key leaked: {text}");
    }
}
