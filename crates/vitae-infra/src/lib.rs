//! # Vitae Infrastructure
//!
//! Concrete implementations of the ports defined in `vitae-core`.
//! This crate contains the window stores, limits sources and cache, clocks,
//! and the LLM provider client.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `redis` - Redis-backed window store shared across instances
//! - `rest` - Limits table read from the hosted backend over HTTP
//! - `llm` - Anthropic Messages API provider

pub mod clock;
pub mod limits;
pub mod rate_limit;

#[cfg(feature = "llm")]
pub mod llm;

// Re-exports - In-Memory
pub use clock::{ManualClock, SystemClock};
pub use limits::{InMemoryLimitsSource, LimitsCacheConfig, LimitsResolver};
pub use rate_limit::{InMemoryWindowStore, RateLimitService};

// Re-exports - External services
#[cfg(feature = "llm")]
pub use llm::{AnthropicConfig, AnthropicProvider};
#[cfg(feature = "rest")]
pub use limits::{RestLimitsConfig, RestLimitsSource};
#[cfg(feature = "redis")]
pub use rate_limit::{RedisConfig, RedisWindowStore, RedisWindowStoreConfig};
