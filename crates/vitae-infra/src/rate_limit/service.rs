//! Rate limit service - the one entry point handlers call.

use std::sync::Arc;

use vitae_core::domain::{Admission, RateLimitExceeded, Verdict};
use vitae_core::ports::{BucketKey, Clock, WindowStore};

use crate::limits::{CacheStats, LimitsResolver};

/// Per-process rate limiter: resolves a feature's limits and runs the
/// admission check against the configured window store.
pub struct RateLimitService {
    store: Arc<dyn WindowStore>,
    resolver: Arc<LimitsResolver>,
    clock: Arc<dyn Clock>,
}

impl RateLimitService {
    pub fn new(
        store: Arc<dyn WindowStore>,
        resolver: Arc<LimitsResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            resolver,
            clock,
        }
    }

    pub fn resolver(&self) -> &Arc<LimitsResolver> {
        &self.resolver
    }

    /// Admit or refuse one call from `caller` to `feature`.
    ///
    /// `Ok(None)` means the feature is not limited (or the store failed and
    /// the call is let through); the store is only touched when limits apply.
    pub async fn check(
        &self,
        feature: &str,
        caller: &str,
    ) -> Result<Option<Admission>, RateLimitExceeded> {
        let Some(limits) = self.resolver.resolve(feature).await else {
            tracing::debug!(feature, "No rate limits configured");
            return Ok(None);
        };
        if limits.is_empty() {
            return Ok(None);
        }

        let bucket = BucketKey::new(feature, caller);
        match self.store.admit(&bucket, &limits, self.clock.now()).await {
            Ok(Verdict::Allowed(admission)) => {
                tracing::debug!(
                    feature,
                    caller = %bucket.caller,
                    remaining = ?admission.remaining,
                    "Rate limit OK"
                );
                Ok(Some(admission))
            }
            Ok(Verdict::Denied(exceeded)) => {
                tracing::warn!(
                    feature,
                    caller = %bucket.caller,
                    period = %exceeded.period,
                    reset_at = %exceeded.reset_at,
                    "Rate limit exceeded"
                );
                Err(exceeded)
            }
            Err(e) => {
                tracing::error!(feature, error = %e, "Window store failed, failing open");
                Ok(None)
            }
        }
    }

    /// Drop idle caller state. Safe to call at any time.
    pub async fn sweep(&self) -> usize {
        match self.store.sweep(self.clock.now()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "Rate limit sweep failed");
                0
            }
        }
    }

    /// Called after an operator changes limits so the next call sees them.
    pub async fn invalidate(&self, feature: Option<&str>) {
        self.resolver.invalidate(feature).await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.resolver.stats().await
    }

    pub async fn tracked_buckets(&self) -> Option<usize> {
        self.store.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use vitae_core::domain::{FeatureLimits, LimitsRecord, WindowPeriod};
    use vitae_core::ports::StoreError;

    use crate::clock::ManualClock;
    use crate::limits::{InMemoryLimitsSource, LimitsCacheConfig};
    use crate::rate_limit::InMemoryWindowStore;

    fn chatbot_row(enabled: bool) -> LimitsRecord {
        LimitsRecord {
            feature_name: "chatbot".to_string(),
            limit_per_minute: Some(4),
            limit_per_hour: Some(10),
            limit_per_day: Some(15),
            is_enabled: enabled,
            updated_at: None,
            updated_by: None,
        }
    }

    fn service_with(
        source: Arc<InMemoryLimitsSource>,
        store: Arc<dyn WindowStore>,
    ) -> (RateLimitService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(0));
        let resolver = Arc::new(LimitsResolver::new(
            source,
            clock.clone(),
            LimitsCacheConfig::default(),
        ));
        (RateLimitService::new(store, resolver, clock.clone()), clock)
    }

    struct BrokenStore;

    #[async_trait]
    impl WindowStore for BrokenStore {
        async fn admit(
            &self,
            _bucket: &BucketKey,
            _limits: &FeatureLimits,
            _now: DateTime<Utc>,
        ) -> Result<Verdict, StoreError> {
            Err(StoreError::Backend("down".to_string()))
        }

        async fn sweep(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
            Err(StoreError::Backend("down".to_string()))
        }

        async fn len(&self) -> Option<usize> {
            None
        }
    }

    #[tokio::test]
    async fn test_chatbot_scenario_end_to_end() {
        let source = Arc::new(InMemoryLimitsSource::from_records([chatbot_row(true)]));
        let (service, clock) = service_with(source, Arc::new(InMemoryWindowStore::new()));

        for _ in 0..4 {
            assert!(service.check("chatbot", "1.2.3.4").await.unwrap().is_some());
            clock.advance(Duration::from_millis(1));
        }

        let denied = service.check("chatbot", "1.2.3.4").await.unwrap_err();
        assert_eq!(denied.period, WindowPeriod::Minute);
        assert_eq!(denied.reset_at_millis(), 60_000);

        clock.set(DateTime::from_timestamp_millis(60_001).unwrap());
        let admitted = service.check("chatbot", "1.2.3.4").await.unwrap().unwrap();
        assert_eq!(admitted.remaining(WindowPeriod::Day), Some(10));
    }

    #[tokio::test]
    async fn test_disabled_feature_never_touches_store() {
        let source = Arc::new(InMemoryLimitsSource::from_records([chatbot_row(false)]));
        let store = Arc::new(InMemoryWindowStore::new());
        let (service, _clock) = service_with(source, store.clone());

        for _ in 0..20 {
            assert!(service.check("chatbot", "1.2.3.4").await.unwrap().is_none());
        }
        assert_eq!(store.len().await, Some(0));
    }

    #[tokio::test]
    async fn test_invalidate_applies_new_limits_immediately() {
        let source = Arc::new(InMemoryLimitsSource::from_records([chatbot_row(true)]));
        let (service, _clock) = service_with(source.clone(), Arc::new(InMemoryWindowStore::new()));

        assert!(service.check("chatbot", "a").await.unwrap().is_some());

        source.set_enabled("chatbot", false).await.unwrap();
        service.invalidate(Some("chatbot")).await;

        for _ in 0..10 {
            assert!(service.check("chatbot", "a").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let source = Arc::new(InMemoryLimitsSource::with_defaults());
        let (service, _clock) = service_with(source, Arc::new(BrokenStore));

        assert!(service.check("chatbot", "a").await.unwrap().is_none());
        assert_eq!(service.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_uses_service_clock() {
        let source = Arc::new(InMemoryLimitsSource::with_defaults());
        let (service, clock) = service_with(source, Arc::new(InMemoryWindowStore::new()));

        service.check("chatbot", "a").await.unwrap();
        service.check("translate", "b").await.unwrap();
        assert_eq!(service.tracked_buckets().await, Some(2));

        clock.advance(Duration::from_secs(60 * 60));
        assert_eq!(service.sweep().await, 0);

        clock.advance(Duration::from_secs(23 * 60 * 60));
        assert_eq!(service.sweep().await, 2);
        assert_eq!(service.tracked_buckets().await, Some(0));
    }
}
