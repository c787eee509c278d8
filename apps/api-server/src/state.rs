//! Application state - shared across all handlers.

use std::sync::Arc;

use vitae_core::ports::{
    Clock, Completion, CompletionRequest, LimitsSource, LlmError, LlmProvider, StoreError,
    WindowStore,
};
use vitae_infra::{
    InMemoryLimitsSource, InMemoryWindowStore, LimitsResolver, RateLimitService, SystemClock,
};

use crate::config::{AppConfig, StoreBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimitService>,
    pub llm: Arc<dyn LlmProvider>,
    pub admin_token: Option<String>,
}

/// Provider used when no LLM API key is configured.
pub struct UnconfiguredLlm;

#[async_trait::async_trait]
impl LlmProvider for UnconfiguredLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

impl AppState {
    /// Build the application state with appropriate implementations.
    ///
    /// Fails only when Redis is required, unreachable and fallback is off.
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = Self::window_store(config.store_backend).await?;
        let source = Self::limits_source();
        let resolver = Arc::new(LimitsResolver::new(
            source,
            clock.clone(),
            config.limits_cache.clone(),
        ));
        let limiter = Arc::new(RateLimitService::new(store, resolver, clock));

        let llm = Self::llm_provider();

        tracing::info!("Application state initialized");

        Ok(Self::from_parts(limiter, llm, config.admin_token.clone()))
    }

    /// Assemble state from ready-made parts.
    pub fn from_parts(
        limiter: Arc<RateLimitService>,
        llm: Arc<dyn LlmProvider>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            limiter,
            llm,
            admin_token,
        }
    }

    #[cfg(feature = "redis")]
    async fn window_store(backend: StoreBackend) -> Result<Arc<dyn WindowStore>, StoreError> {
        use vitae_infra::{RedisWindowStore, RedisWindowStoreConfig};

        if backend == StoreBackend::Memory {
            return Ok(Arc::new(InMemoryWindowStore::new()));
        }

        let config = RedisWindowStoreConfig::from_env();
        let fallback = config.redis.fallback_to_memory;
        match RedisWindowStore::new(config).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(e) if fallback => {
                tracing::error!(
                    "Failed to connect to Redis: {}. Using in-memory window store.",
                    e
                );
                Ok(Arc::new(InMemoryWindowStore::new()))
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn window_store(backend: StoreBackend) -> Result<Arc<dyn WindowStore>, StoreError> {
        if backend == StoreBackend::Redis {
            tracing::warn!("Built without redis feature - using in-memory window store");
        }
        Ok(Arc::new(InMemoryWindowStore::new()))
    }

    #[cfg(feature = "rest")]
    fn limits_source() -> Arc<dyn LimitsSource> {
        use vitae_infra::{RestLimitsConfig, RestLimitsSource};

        let Some(config) = RestLimitsConfig::from_env() else {
            tracing::warn!(
                "SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY not set. Using in-memory limits table."
            );
            return Arc::new(InMemoryLimitsSource::with_defaults());
        };

        match RestLimitsSource::new(config) {
            Ok(source) => Arc::new(source),
            Err(e) => {
                tracing::error!("Failed to build limits client: {}. Using in-memory limits.", e);
                Arc::new(InMemoryLimitsSource::with_defaults())
            }
        }
    }

    #[cfg(not(feature = "rest"))]
    fn limits_source() -> Arc<dyn LimitsSource> {
        tracing::info!("Running without rest feature - using in-memory limits table");
        Arc::new(InMemoryLimitsSource::with_defaults())
    }

    #[cfg(feature = "llm")]
    fn llm_provider() -> Arc<dyn LlmProvider> {
        use vitae_infra::{AnthropicConfig, AnthropicProvider};

        let Some(config) = AnthropicConfig::from_env() else {
            tracing::warn!("ANTHROPIC_API_KEY not set. LLM endpoints will answer 500.");
            return Arc::new(UnconfiguredLlm);
        };

        match AnthropicProvider::new(config) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                tracing::error!("Failed to build LLM client: {}", e);
                Arc::new(UnconfiguredLlm)
            }
        }
    }

    #[cfg(not(feature = "llm"))]
    fn llm_provider() -> Arc<dyn LlmProvider> {
        tracing::info!("Running without llm feature - LLM endpoints disabled");
        Arc::new(UnconfiguredLlm)
    }
}
