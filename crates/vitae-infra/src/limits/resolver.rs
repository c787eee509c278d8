//! Feature limits resolution with a TTL cache and default fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use vitae_core::domain::{FeatureLimits, default_limits_for};
use vitae_core::ports::{Clock, LimitsSource, LimitsSourceError};

/// Limits cache configuration.
#[derive(Debug, Clone)]
pub struct LimitsCacheConfig {
    /// How long a fetched value is served before refetching.
    pub ttl: Duration,
    /// Upper bound on one configuration fetch.
    pub fetch_timeout: Duration,
}

impl Default for LimitsCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            fetch_timeout: Duration::from_secs(3),
        }
    }
}

impl LimitsCacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: std::env::var("LIMITS_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            fetch_timeout: std::env::var("LIMITS_FETCH_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_timeout),
        }
    }
}

struct CachedLimits {
    /// `None` caches "do not limit" so disabled features are not refetched.
    limits: Option<FeatureLimits>,
    fetched_at: DateTime<Utc>,
}

/// Snapshot of the cache for operators.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<CacheEntryStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStats {
    pub feature: String,
    pub age_ms: i64,
    pub expired: bool,
}

/// Resolves a feature name to its current limits.
///
/// Source failures never surface: they are logged and replaced by the
/// built-in defaults (or no limiting for unknown features).
pub struct LimitsResolver {
    source: Arc<dyn LimitsSource>,
    clock: Arc<dyn Clock>,
    config: LimitsCacheConfig,
    cache: RwLock<HashMap<String, CachedLimits>>,
    /// Bumped by `invalidate`; fetches started under an older value are not cached.
    generation: AtomicU64,
}

impl LimitsResolver {
    pub fn new(
        source: Arc<dyn LimitsSource>,
        clock: Arc<dyn Clock>,
        config: LimitsCacheConfig,
    ) -> Self {
        Self {
            source,
            clock,
            config,
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &Arc<dyn LimitsSource> {
        &self.source
    }

    fn ttl(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.ttl).unwrap_or(TimeDelta::MAX)
    }

    fn is_fresh(&self, entry: &CachedLimits, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.fetched_at) < self.ttl()
    }

    /// Limits for `feature`, or `None` when it must not be limited.
    pub async fn resolve(&self, feature: &str) -> Option<FeatureLimits> {
        let now = self.clock.now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(feature) {
                if self.is_fresh(entry, now) {
                    tracing::trace!(feature, "Using cached rate limits");
                    return entry.limits.clone();
                }
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let fetched = tokio::time::timeout(self.config.fetch_timeout, self.source.fetch(feature))
            .await
            .unwrap_or(Err(LimitsSourceError::Timeout));

        match fetched {
            Ok(record) => {
                let limits = record.to_limits();
                match &limits {
                    Some(limits) => {
                        tracing::debug!(feature, windows = limits.len(), "Rate limits loaded")
                    }
                    None => tracing::info!(feature, "Rate limiting disabled"),
                }

                let mut cache = self.cache.write().await;
                if self.generation.load(Ordering::Acquire) == generation {
                    cache.insert(
                        feature.to_string(),
                        CachedLimits {
                            limits: limits.clone(),
                            fetched_at: now,
                        },
                    );
                } else {
                    tracing::debug!(feature, "Cache invalidated during fetch, not caching");
                }
                limits
            }
            Err(err) => Self::fallback(feature, &err),
        }
    }

    fn fallback(feature: &str, err: &LimitsSourceError) -> Option<FeatureLimits> {
        match default_limits_for(feature) {
            Some(limits) => {
                tracing::warn!(feature, error = %err, "Limits source failed, using default limits");
                Some(limits)
            }
            None => {
                tracing::warn!(
                    feature,
                    error = %err,
                    "No default limits for unknown feature, not rate limiting"
                );
                None
            }
        }
    }

    /// Evicts one feature, or everything when `feature` is `None`.
    pub async fn invalidate(&self, feature: Option<&str>) {
        let mut cache = self.cache.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        match feature {
            Some(feature) => {
                cache.remove(feature);
                tracing::info!(feature, "Rate limits cache cleared");
            }
            None => {
                cache.clear();
                tracing::info!("All rate limits cache cleared");
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let cache = self.cache.read().await;

        let mut entries: Vec<_> = cache
            .iter()
            .map(|(feature, entry)| CacheEntryStats {
                feature: feature.clone(),
                age_ms: now.signed_duration_since(entry.fetched_at).num_milliseconds(),
                expired: !self.is_fresh(entry, now),
            })
            .collect();
        entries.sort_by(|a, b| a.feature.cmp(&b.feature));

        CacheStats {
            size: cache.len(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use vitae_core::domain::{LimitsChange, LimitsRecord, LimitsUpdate, WindowPeriod};

    use crate::clock::ManualClock;
    use crate::limits::InMemoryLimitsSource;

    /// Wraps a source and counts fetches; can be switched to fail.
    struct CountingSource {
        inner: InMemoryLimitsSource,
        fetches: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingSource {
        fn new(inner: InMemoryLimitsSource) -> Self {
            Self {
                inner,
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LimitsSource for CountingSource {
        async fn fetch(&self, feature: &str) -> Result<LimitsRecord, LimitsSourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(LimitsSourceError::Unavailable("connection refused".to_string()));
            }
            self.inner.fetch(feature).await
        }

        async fn list(&self) -> Result<Vec<LimitsRecord>, LimitsSourceError> {
            self.inner.list().await
        }

        async fn update(
            &self,
            update: &LimitsUpdate,
            actor: &str,
        ) -> Result<LimitsChange, LimitsSourceError> {
            self.inner.update(update, actor).await
        }
    }

    /// Never answers, to exercise the fetch timeout.
    struct HangingSource;

    #[async_trait]
    impl LimitsSource for HangingSource {
        async fn fetch(&self, _feature: &str) -> Result<LimitsRecord, LimitsSourceError> {
            std::future::pending().await
        }

        async fn list(&self) -> Result<Vec<LimitsRecord>, LimitsSourceError> {
            Ok(Vec::new())
        }

        async fn update(
            &self,
            update: &LimitsUpdate,
            _actor: &str,
        ) -> Result<LimitsChange, LimitsSourceError> {
            Err(LimitsSourceError::NotFound(update.feature_name.clone()))
        }
    }

    /// Reads the row, then parks the first fetch until released.
    struct StallingSource {
        inner: InMemoryLimitsSource,
        stall_next: AtomicBool,
        stalled: Notify,
        release: Notify,
    }

    #[async_trait]
    impl LimitsSource for StallingSource {
        async fn fetch(&self, feature: &str) -> Result<LimitsRecord, LimitsSourceError> {
            let record = self.inner.fetch(feature).await;
            if self.stall_next.swap(false, Ordering::SeqCst) {
                self.stalled.notify_one();
                self.release.notified().await;
            }
            record
        }

        async fn list(&self) -> Result<Vec<LimitsRecord>, LimitsSourceError> {
            self.inner.list().await
        }

        async fn update(
            &self,
            update: &LimitsUpdate,
            actor: &str,
        ) -> Result<LimitsChange, LimitsSourceError> {
            self.inner.update(update, actor).await
        }
    }

    fn record(
        feature: &str,
        minute: Option<u32>,
        hour: Option<u32>,
        day: Option<u32>,
        enabled: bool,
    ) -> LimitsRecord {
        LimitsRecord {
            feature_name: feature.to_string(),
            limit_per_minute: minute,
            limit_per_hour: hour,
            limit_per_day: day,
            is_enabled: enabled,
            updated_at: None,
            updated_by: None,
        }
    }

    fn setup(
        records: Vec<LimitsRecord>,
    ) -> (Arc<CountingSource>, Arc<ManualClock>, LimitsResolver) {
        let source = Arc::new(CountingSource::new(InMemoryLimitsSource::from_records(
            records,
        )));
        let clock = Arc::new(ManualClock::at_millis(0));
        let resolver =
            LimitsResolver::new(source.clone(), clock.clone(), LimitsCacheConfig::default());
        (source, clock, resolver)
    }

    #[tokio::test]
    async fn test_cached_within_ttl_refetched_after() {
        let (source, clock, resolver) = setup(vec![record("chatbot", Some(7), None, None, true)]);

        let limits = resolver.resolve("chatbot").await.unwrap();
        assert_eq!(limits.get(WindowPeriod::Minute).unwrap().threshold, 7);
        assert_eq!(source.fetches(), 1);

        clock.advance(Duration::from_secs(299));
        resolver.resolve("chatbot").await.unwrap();
        assert_eq!(source.fetches(), 1);

        clock.advance(Duration::from_secs(1));
        resolver.resolve("chatbot").await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (source, _clock, resolver) =
            setup(vec![record("translate", Some(10), Some(50), None, true)]);

        resolver.resolve("translate").await;
        resolver.invalidate(Some("translate")).await;
        resolver.resolve("translate").await;
        assert_eq!(source.fetches(), 2);

        resolver.invalidate(None).await;
        assert_eq!(resolver.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_update_then_invalidate_serves_new_thresholds() {
        let (source, _clock, resolver) =
            setup(vec![record("chatbot", Some(4), Some(10), Some(15), true)]);
        resolver.resolve("chatbot").await;

        let update = LimitsUpdate {
            feature_name: "chatbot".to_string(),
            thresholds: vitae_core::domain::Thresholds::new(Some(1), None, None),
        };
        source.update(&update, "operator").await.unwrap();
        resolver.invalidate(Some("chatbot")).await;

        let limits = resolver.resolve("chatbot").await.unwrap();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits.get(WindowPeriod::Minute).unwrap().threshold, 1);
    }

    #[tokio::test]
    async fn test_fetch_racing_invalidate_is_not_cached() {
        let source = Arc::new(StallingSource {
            inner: InMemoryLimitsSource::from_records(vec![record(
                "chatbot",
                Some(4),
                Some(10),
                Some(15),
                true,
            )]),
            stall_next: AtomicBool::new(true),
            stalled: Notify::new(),
            release: Notify::new(),
        });
        let resolver = Arc::new(LimitsResolver::new(
            source.clone(),
            Arc::new(ManualClock::at_millis(0)),
            LimitsCacheConfig {
                ttl: Duration::from_secs(300),
                fetch_timeout: Duration::from_secs(30),
            },
        ));

        let in_flight = {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("chatbot").await })
        };
        source.stalled.notified().await;

        let update = LimitsUpdate {
            feature_name: "chatbot".to_string(),
            thresholds: vitae_core::domain::Thresholds::new(Some(1), None, None),
        };
        source.update(&update, "operator").await.unwrap();
        resolver.invalidate(Some("chatbot")).await;

        source.release.notify_one();
        let stale = in_flight.await.unwrap().unwrap();
        assert_eq!(stale.get(WindowPeriod::Minute).unwrap().threshold, 4);
        assert_eq!(resolver.stats().await.size, 0);

        let limits = resolver.resolve("chatbot").await.unwrap();
        assert_eq!(limits.get(WindowPeriod::Minute).unwrap().threshold, 1);
    }

    #[tokio::test]
    async fn test_disabled_feature_cached_as_unlimited() {
        let (source, _clock, resolver) = setup(vec![
            record("chatbot", Some(4), Some(10), Some(15), false),
            record("translate", None, None, None, true),
        ]);

        assert!(resolver.resolve("chatbot").await.is_none());
        assert!(resolver.resolve("chatbot").await.is_none());
        assert!(resolver.resolve("translate").await.is_none());
        assert!(resolver.resolve("translate").await.is_none());
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_source_failure_falls_back_to_defaults() {
        let (source, _clock, resolver) = setup(Vec::new());
        source.failing.store(true, Ordering::SeqCst);

        let limits = resolver.resolve("fit_assessment").await.unwrap();
        assert_eq!(
            limits,
            vitae_core::domain::Feature::FitAssessment
                .default_limits()
                .unwrap()
        );

        assert!(resolver.resolve("unheard_of").await.is_none());

        // Fallbacks are not cached; the source is retried.
        resolver.resolve("fit_assessment").await;
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_missing_row_falls_back_to_defaults() {
        let (_source, _clock, resolver) = setup(Vec::new());
        let limits = resolver.resolve("statistics").await.unwrap();
        assert_eq!(limits.get(WindowPeriod::Day).unwrap().threshold, 20);
    }

    #[tokio::test]
    async fn test_fetch_timeout_falls_back_to_defaults() {
        let resolver = LimitsResolver::new(
            Arc::new(HangingSource),
            Arc::new(ManualClock::at_millis(0)),
            LimitsCacheConfig {
                ttl: Duration::from_secs(300),
                fetch_timeout: Duration::from_millis(50),
            },
        );

        let limits = resolver.resolve("chatbot").await.unwrap();
        assert_eq!(limits.get(WindowPeriod::Minute).unwrap().threshold, 4);
    }

    #[tokio::test]
    async fn test_stats_report_age_and_expiry() {
        let (_source, clock, resolver) =
            setup(vec![record("chatbot", Some(4), None, None, true)]);
        resolver.resolve("chatbot").await;

        clock.advance(Duration::from_secs(301));
        let stats = resolver.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.entries[0].feature, "chatbot");
        assert_eq!(stats.entries[0].age_ms, 301_000);
        assert!(stats.entries[0].expired);
    }
}
