//! LLM provider port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Overrides the provider's configured default.
    pub max_tokens: Option<u32>,
}

/// Text produced by the provider.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// LLM provider trait - the expensive call every protected endpoint gates.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM provider not configured")]
    NotConfigured,

    #[error("Request to LLM provider failed: {0}")]
    Transport(String),

    #[error("LLM provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected LLM response: {0}")]
    Decode(String),
}
