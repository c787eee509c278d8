//! Redis window store: the shared caller state lives in Redis so every
//! instance sees the same counts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use vitae_core::domain::{CallerState, FeatureLimits, Verdict};
use vitae_core::ports::{BucketKey, StoreError, WindowStore};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Redis window store configuration.
#[derive(Debug, Clone)]
pub struct RedisWindowStoreConfig {
    /// Redis connection config
    pub redis: RedisConfig,
    /// Key prefix for bucket keys
    pub key_prefix: String,
    /// Compare-and-swap attempts before giving up on a contended bucket
    pub max_attempts: u32,
}

impl Default for RedisWindowStoreConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: "ratelimit".to_string(),
            max_attempts: 8,
        }
    }
}

impl RedisWindowStoreConfig {
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "ratelimit".to_string()),
            max_attempts: std::env::var("RATE_LIMIT_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
        }
    }
}

/// Redis-backed window store.
///
/// Each bucket is a JSON-encoded [`CallerState`]. An admission reads it, runs
/// the check locally and writes the result back through a Lua script that
/// only applies when the stored value is unchanged; on conflict the whole
/// read-check-write is retried. Keys expire after the longest window, so
/// idle callers need no sweep.
pub struct RedisWindowStore {
    conn: ConnectionManager,
    config: RedisWindowStoreConfig,
    /// Lua compare-and-swap with expiry
    swap: Script,
}

impl RedisWindowStore {
    pub async fn new(config: RedisWindowStoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.redis.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Backend("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Returns 1 if the value was swapped, 0 if someone else wrote first
        let swap = Script::new(
            r#"
            local current = redis.call('GET', KEYS[1])
            if current == false then
                current = ''
            end

            if current == ARGV[1] then
                redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
                return 1
            end
            return 0
            "#,
        );

        tracing::info!(url = %config.redis.url, "Connected to Redis window store");

        Ok(Self { conn, config, swap })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(RedisWindowStoreConfig::from_env()).await
    }

    fn make_key(&self, bucket: &BucketKey) -> String {
        format!("{}:{}", self.config.key_prefix, bucket)
    }
}

fn expiry_millis(limits: &FeatureLimits) -> u64 {
    limits
        .longest_window()
        .map(|w| w.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(1)
        .max(1)
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn admit(
        &self,
        bucket: &BucketKey,
        limits: &FeatureLimits,
        now: DateTime<Utc>,
    ) -> Result<Verdict, StoreError> {
        let key = self.make_key(bucket);
        let expiry = expiry_millis(limits);
        let mut conn = self.conn.clone();

        for attempt in 1..=self.config.max_attempts {
            let current: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            let mut state = match current.as_deref() {
                Some(raw) => serde_json::from_str::<CallerState>(raw).map_err(|e| {
                    StoreError::Corrupt {
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                })?,
                None => CallerState::new(),
            };

            let verdict = state.admit(limits, now);
            if !verdict.is_allowed() {
                return Ok(verdict);
            }

            let next =
                serde_json::to_string(&state).map_err(|e| StoreError::Backend(e.to_string()))?;

            let swapped: i32 = self
                .swap
                .key(&key)
                .arg(current.as_deref().unwrap_or(""))
                .arg(&next)
                .arg(expiry)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            if swapped == 1 {
                return Ok(verdict);
            }

            tracing::debug!(key = %key, attempt, "Bucket changed underneath, retrying");
        }

        Err(StoreError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
        // Keys carry their own expiry.
        Ok(0)
    }

    async fn len(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitae_core::domain::{WindowLimit, WindowPeriod};

    async fn get_test_store() -> Option<RedisWindowStore> {
        let config = RedisWindowStoreConfig {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
                connect_timeout: Duration::from_secs(1),
                fallback_to_memory: false,
            },
            key_prefix: format!("test_ratelimit_{}", Utc::now().timestamp_nanos_opt().unwrap_or(0)),
            max_attempts: 8,
        };

        RedisWindowStore::new(config).await.ok()
    }

    #[test]
    fn test_expiry_follows_longest_window() {
        let limits = FeatureLimits::new()
            .with(WindowPeriod::Minute, WindowLimit::per(WindowPeriod::Minute, 4))
            .with(WindowPeriod::Hour, WindowLimit::per(WindowPeriod::Hour, 10));
        assert_eq!(expiry_millis(&limits), 3_600_000);
        assert_eq!(expiry_millis(&FeatureLimits::new()), 1);
    }

    #[tokio::test]
    async fn test_redis_window_store() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let limits = FeatureLimits::new()
            .with(WindowPeriod::Minute, WindowLimit::per(WindowPeriod::Minute, 2))
            .with(WindowPeriod::Hour, WindowLimit::per(WindowPeriod::Hour, 5));
        let bucket = BucketKey::new("chatbot", "test_user_1");
        let t0 = Utc::now();

        // First two calls - allowed
        let res = store.admit(&bucket, &limits, t0).await.unwrap();
        assert!(res.is_allowed());
        let res = store.admit(&bucket, &limits, t0).await.unwrap();
        assert!(res.is_allowed());

        // Third call - rejected by the minute window
        match store.admit(&bucket, &limits, t0).await.unwrap() {
            Verdict::Denied(exceeded) => assert_eq!(exceeded.period, WindowPeriod::Minute),
            Verdict::Allowed(_) => panic!("third call should be denied"),
        }

        // A minute later the minute window has rolled over
        let later = t0 + chrono::TimeDelta::seconds(61);
        let res = store.admit(&bucket, &limits, later).await.unwrap();
        assert!(res.is_allowed());
    }
}
