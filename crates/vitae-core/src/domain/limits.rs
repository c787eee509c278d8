//! Per-feature thresholds and the configuration rows they are built from.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::WindowPeriod;
use crate::error::DomainError;

/// Smallest threshold an operator may configure.
pub const MIN_THRESHOLD: u32 = 1;
/// Largest threshold an operator may configure.
pub const MAX_THRESHOLD: u32 = 10_000;

/// Cap for a single window: at most `threshold` admitted calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub threshold: u32,
    pub window: Duration,
}

impl WindowLimit {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self { threshold, window }
    }

    /// Limit over the period's canonical window.
    pub fn per(period: WindowPeriod, threshold: u32) -> Self {
        Self::new(threshold, period.canonical_window())
    }
}

/// Sparse mapping from period to limit for one feature.
///
/// A period that is absent is not capped. Iteration follows the check order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureLimits {
    windows: BTreeMap<WindowPeriod, WindowLimit>,
}

impl FeatureLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, period: WindowPeriod, limit: WindowLimit) -> Self {
        self.windows.insert(period, limit);
        self
    }

    /// Builds limits from optional per-period thresholds using canonical windows.
    /// Returns `None` when no period carries a threshold.
    pub fn from_thresholds(thresholds: Thresholds) -> Option<Self> {
        let limits = WindowPeriod::ALL
            .into_iter()
            .filter_map(|period| {
                thresholds
                    .get(period)
                    .map(|threshold| (period, WindowLimit::per(period, threshold)))
            })
            .fold(Self::new(), |acc, (period, limit)| acc.with(period, limit));

        (!limits.is_empty()).then_some(limits)
    }

    pub fn get(&self, period: WindowPeriod) -> Option<&WindowLimit> {
        self.windows.get(&period)
    }

    /// Configured windows, shortest period first.
    pub fn iter(&self) -> impl Iterator<Item = (WindowPeriod, &WindowLimit)> {
        self.windows.iter().map(|(period, limit)| (*period, limit))
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn longest_window(&self) -> Option<Duration> {
        self.windows.values().map(|limit| limit.window).max()
    }
}

/// Raw per-period thresholds, `None` meaning "no cap for this period".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub day: Option<u32>,
}

impl Thresholds {
    pub fn new(minute: Option<u32>, hour: Option<u32>, day: Option<u32>) -> Self {
        Self { minute, hour, day }
    }

    pub fn get(&self, period: WindowPeriod) -> Option<u32> {
        // Zero is never a usable cap; treat it like an unset column.
        let value = match period {
            WindowPeriod::Minute => self.minute,
            WindowPeriod::Hour => self.hour,
            WindowPeriod::Day => self.day,
        };
        value.filter(|v| *v > 0)
    }
}

/// One row of the limits configuration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsRecord {
    pub feature_name: String,
    pub limit_per_minute: Option<u32>,
    pub limit_per_hour: Option<u32>,
    pub limit_per_day: Option<u32>,
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl LimitsRecord {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.limit_per_minute, self.limit_per_hour, self.limit_per_day)
    }

    /// Resolves the row into enforceable limits.
    ///
    /// Disabled rows and rows without any threshold both mean "do not limit".
    pub fn to_limits(&self) -> Option<FeatureLimits> {
        if !self.is_enabled {
            return None;
        }
        FeatureLimits::from_thresholds(self.thresholds())
    }
}

/// Operator request to replace a feature's thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsUpdate {
    pub feature_name: String,
    pub thresholds: Thresholds,
}

impl LimitsUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.feature_name.trim().is_empty() {
            return Err(DomainError::Validation("feature_name is required".to_string()));
        }

        let in_range =
            |v: Option<u32>| v.is_none_or(|v| (MIN_THRESHOLD..=MAX_THRESHOLD).contains(&v));
        let t = &self.thresholds;
        if !(in_range(t.minute) && in_range(t.hour) && in_range(t.day)) {
            return Err(DomainError::Validation(format!(
                "Invalid limit values. Must be integers between {MIN_THRESHOLD} and {MAX_THRESHOLD}, or null"
            )));
        }
        Ok(())
    }
}

/// Before/after snapshot of an applied update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsChange {
    pub feature: String,
    pub old_limits: Thresholds,
    pub new_limits: Thresholds,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        minute: Option<u32>,
        hour: Option<u32>,
        day: Option<u32>,
        enabled: bool,
    ) -> LimitsRecord {
        LimitsRecord {
            feature_name: "chatbot".to_string(),
            limit_per_minute: minute,
            limit_per_hour: hour,
            limit_per_day: day,
            is_enabled: enabled,
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn disabled_record_means_no_limits() {
        assert_eq!(record(Some(4), Some(10), Some(15), false).to_limits(), None);
    }

    #[test]
    fn all_null_thresholds_mean_no_limits() {
        assert_eq!(record(None, None, None, true).to_limits(), None);
    }

    #[test]
    fn null_periods_are_omitted() {
        let limits = record(Some(10), Some(50), None, true).to_limits().unwrap();
        assert_eq!(limits.len(), 2);
        assert!(limits.get(WindowPeriod::Day).is_none());
        assert_eq!(
            limits.get(WindowPeriod::Hour),
            Some(&WindowLimit::new(50, Duration::from_secs(3600)))
        );
    }

    #[test]
    fn iteration_follows_check_order() {
        let limits = FeatureLimits::new()
            .with(WindowPeriod::Day, WindowLimit::per(WindowPeriod::Day, 5))
            .with(WindowPeriod::Minute, WindowLimit::per(WindowPeriod::Minute, 2));
        let order: Vec<_> = limits.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec![WindowPeriod::Minute, WindowPeriod::Day]);
        assert_eq!(limits.longest_window(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn update_validation_bounds() {
        let mut update = LimitsUpdate {
            feature_name: "translate".to_string(),
            thresholds: Thresholds::new(Some(1), None, Some(10_000)),
        };
        assert!(update.validate().is_ok());

        update.thresholds.hour = Some(0);
        assert!(update.validate().is_err());

        update.thresholds.hour = Some(10_001);
        assert!(update.validate().is_err());

        update.thresholds.hour = None;
        update.feature_name = "  ".to_string();
        assert!(update.validate().is_err());
    }
}
