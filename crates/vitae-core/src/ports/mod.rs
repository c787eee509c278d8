//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod limits_source;
mod llm;
mod window_store;

pub use clock::Clock;
pub use limits_source::{LimitsSource, LimitsSourceError};
pub use llm::{ChatMessage, ChatRole, Completion, CompletionRequest, LlmError, LlmProvider};
pub use window_store::{BucketKey, StoreError, WindowStore};
