//! In-memory window store backed by a sharded concurrent map.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use vitae_core::domain::{CallerState, FeatureLimits, Verdict};
use vitae_core::ports::{BucketKey, StoreError, WindowStore};

/// Per-process window store.
///
/// The admission check runs while holding the bucket's shard guard, so two
/// calls for one caller never interleave while unrelated callers proceed.
/// Note: state is lost on restart and not shared across instances.
#[derive(Default)]
pub struct InMemoryWindowStore {
    buckets: DashMap<BucketKey, CallerState>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: &BucketKey) -> bool {
        self.buckets.contains_key(bucket)
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn admit(
        &self,
        bucket: &BucketKey,
        limits: &FeatureLimits,
        now: DateTime<Utc>,
    ) -> Result<Verdict, StoreError> {
        if let Some(mut state) = self.buckets.get_mut(bucket) {
            return Ok(state.admit(limits, now));
        }

        let mut state = self.buckets.entry(bucket.clone()).or_default();
        Ok(state.admit(limits, now))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.buckets.retain(|_, state| {
            state.prune(now);
            let keep = !state.is_idle(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        tracing::debug!(removed, remaining = self.buckets.len(), "Swept idle rate-limit buckets");
        Ok(removed)
    }

    async fn len(&self) -> Option<usize> {
        Some(self.buckets.len())
    }
}
