//! Limits configuration source port.

use async_trait::async_trait;

use crate::domain::{LimitsChange, LimitsRecord, LimitsUpdate};

/// Where per-feature thresholds are configured (hosted table, in-memory seed).
#[async_trait]
pub trait LimitsSource: Send + Sync {
    /// Fetch the row for one feature.
    async fn fetch(&self, feature: &str) -> Result<LimitsRecord, LimitsSourceError>;

    /// All rows, ordered by feature name.
    async fn list(&self) -> Result<Vec<LimitsRecord>, LimitsSourceError>;

    /// Replace a feature's thresholds. `actor` identifies who made the change.
    async fn update(
        &self,
        update: &LimitsUpdate,
        actor: &str,
    ) -> Result<LimitsChange, LimitsSourceError>;
}

/// Limits source errors.
#[derive(Debug, thiserror::Error)]
pub enum LimitsSourceError {
    #[error("No limits configured for feature '{0}'")]
    NotFound(String),

    #[error("Limits source unavailable: {0}")]
    Unavailable(String),

    #[error("Limits source timed out")]
    Timeout,

    #[error("Malformed limits response: {0}")]
    Decode(String),
}
