//! Limits configuration - sources and the caching resolver.

mod memory;
mod resolver;

pub use memory::InMemoryLimitsSource;
pub use resolver::{CacheEntryStats, CacheStats, LimitsCacheConfig, LimitsResolver};

#[cfg(feature = "rest")]
mod rest;
#[cfg(feature = "rest")]
pub use self::rest::{RestLimitsConfig, RestLimitsSource};
