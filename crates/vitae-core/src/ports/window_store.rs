//! Window store port - where per-caller call logs live.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{FeatureLimits, Verdict};

/// Identifies one caller's bucket for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub feature: String,
    pub caller: String,
}

impl BucketKey {
    /// Sentinel caller used when no identity could be resolved.
    pub const UNKNOWN_CALLER: &'static str = "unknown";

    pub fn new(feature: impl Into<String>, caller: impl Into<String>) -> Self {
        let caller = caller.into();
        let caller = if caller.trim().is_empty() {
            Self::UNKNOWN_CALLER.to_string()
        } else {
            caller
        };
        Self {
            feature: feature.into(),
            caller,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feature, self.caller)
    }
}

/// Window store trait - abstraction over where caller state is kept.
///
/// Implementations run [`CallerState::admit`](crate::domain::CallerState::admit)
/// and must make the check-then-record step atomic per bucket.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Check whether a call at `now` is allowed and record it if so.
    async fn admit(
        &self,
        bucket: &BucketKey,
        limits: &FeatureLimits,
        now: DateTime<Utc>,
    ) -> Result<Verdict, StoreError>;

    /// Drop buckets with no live call at `now`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Number of buckets currently tracked, if the backend can tell.
    async fn len(&self) -> Option<usize>;
}

/// Window store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Corrupt state for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Gave up after {attempts} conflicting updates")]
    Contention { attempts: u32 },
}
