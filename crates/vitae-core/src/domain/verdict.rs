use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::WindowPeriod;

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed(Admission),
    Denied(RateLimitExceeded),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed(_))
    }

    pub fn into_result(self) -> Result<Admission, RateLimitExceeded> {
        match self {
            Verdict::Allowed(admission) => Ok(admission),
            Verdict::Denied(exceeded) => Err(exceeded),
        }
    }
}

/// Headroom left in each configured window after an admitted call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    pub remaining: BTreeMap<WindowPeriod, u32>,
}

impl Admission {
    pub fn remaining(&self, period: WindowPeriod) -> Option<u32> {
        self.remaining.get(&period).copied()
    }
}

/// A call refused because one window is full.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded: {threshold} calls per {period}, resets at {reset_at}")]
pub struct RateLimitExceeded {
    /// First full window in check order.
    pub period: WindowPeriod,
    pub threshold: u32,
    /// When the oldest call in the breached window falls out of it.
    pub reset_at: DateTime<Utc>,
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Epoch milliseconds of the reset instant.
    pub fn reset_at_millis(&self) -> i64 {
        self.reset_at.timestamp_millis()
    }

    pub fn wait_minutes(&self) -> u64 {
        self.retry_after.as_millis().div_ceil(60_000) as u64
    }

    pub fn wait_hours(&self) -> u64 {
        self.retry_after.as_millis().div_ceil(3_600_000) as u64
    }

    /// Human-facing retry hint; the day window is reported in hours.
    pub fn message(&self) -> String {
        let (amount, unit) = match self.period {
            WindowPeriod::Minute | WindowPeriod::Hour => (self.wait_minutes().max(1), "minute"),
            WindowPeriod::Day => (self.wait_hours().max(1), "hour"),
        };
        let plural = if amount > 1 { "s" } else { "" };
        format!(
            "You have reached the limit of {} requests per {}. Please try again in {amount} {unit}{plural}.",
            self.threshold, self.period
        )
    }
}
