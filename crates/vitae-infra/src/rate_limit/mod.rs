//! Rate limiting - window stores and the service that ties them to limits.

mod memory;
mod service;

pub use memory::InMemoryWindowStore;
pub use service::RateLimitService;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisWindowStore, RedisWindowStoreConfig};
