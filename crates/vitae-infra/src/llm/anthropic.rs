//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use vitae_core::ports::{ChatMessage, Completion, CompletionRequest, LlmError, LlmProvider};

const API_VERSION: &str = "2023-06-01";

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Load from environment; `None` when `ANTHROPIC_API_KEY` is unset.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            max_tokens: std::env::var("ANTHROPIC_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024),
            timeout: Duration::from_secs(
                std::env::var("ANTHROPIC_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl MessagesResponse {
    fn into_completion(self) -> Completion {
        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Completion {
            text,
            model: self.model,
            stop_reason: self.stop_reason,
        }
    }
}

/// Calls the Messages API with a fixed model.
pub struct AnthropicProvider {
    http: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        tracing::info!(model = %config.model, "Anthropic provider configured");
        Ok(Self { http, config })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let body = MessagesBody {
            model: &self.config.model,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: &request.system,
            messages: &request.messages,
        };

        let response = self
            .http
            .post(format!(
                "{}/v1/messages",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| "Error calling LLM provider".to_string());
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(parsed.into_completion())
    }
}
