//! In-memory limits table - used when no hosted backend is configured.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use vitae_core::domain::{Feature, LimitsChange, LimitsRecord, LimitsUpdate};
use vitae_core::ports::{LimitsSource, LimitsSourceError};

/// Limits table held in process memory.
///
/// Note: operator edits are lost on process restart.
pub struct InMemoryLimitsSource {
    rows: RwLock<BTreeMap<String, LimitsRecord>>,
}

impl InMemoryLimitsSource {
    pub fn from_records(records: impl IntoIterator<Item = LimitsRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| (record.feature_name.clone(), record))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// One enabled row per known feature, seeded with the built-in defaults.
    pub fn with_defaults() -> Self {
        Self::from_records(Feature::ALL.into_iter().map(|feature| {
            let t = feature.default_thresholds();
            LimitsRecord {
                feature_name: feature.as_str().to_string(),
                limit_per_minute: t.minute,
                limit_per_hour: t.hour,
                limit_per_day: t.day,
                is_enabled: true,
                updated_at: None,
                updated_by: None,
            }
        }))
    }

    pub async fn set_enabled(&self, feature: &str, enabled: bool) -> Result<(), LimitsSourceError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(feature)
            .ok_or_else(|| LimitsSourceError::NotFound(feature.to_string()))?;
        row.is_enabled = enabled;
        Ok(())
    }
}

impl Default for InMemoryLimitsSource {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl LimitsSource for InMemoryLimitsSource {
    async fn fetch(&self, feature: &str) -> Result<LimitsRecord, LimitsSourceError> {
        self.rows
            .read()
            .await
            .get(feature)
            .cloned()
            .ok_or_else(|| LimitsSourceError::NotFound(feature.to_string()))
    }

    async fn list(&self) -> Result<Vec<LimitsRecord>, LimitsSourceError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn update(
        &self,
        update: &LimitsUpdate,
        actor: &str,
    ) -> Result<LimitsChange, LimitsSourceError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&update.feature_name)
            .ok_or_else(|| LimitsSourceError::NotFound(update.feature_name.clone()))?;

        let old_limits = row.thresholds();
        let new_limits = update.thresholds;

        row.limit_per_minute = new_limits.minute;
        row.limit_per_hour = new_limits.hour;
        row.limit_per_day = new_limits.day;
        row.updated_at = Some(chrono::Utc::now());
        row.updated_by = Some(actor.to_string());

        Ok(LimitsChange {
            feature: update.feature_name.clone(),
            old_limits,
            new_limits,
        })
    }
}
