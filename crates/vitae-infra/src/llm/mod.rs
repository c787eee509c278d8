//! LLM provider implementations.

mod anthropic;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
