//! Sliding-window call logs and the multi-window admission check.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Admission, FeatureLimits, RateLimitExceeded, Verdict, WindowPeriod};

fn to_delta(span: Duration) -> TimeDelta {
    TimeDelta::from_std(span).unwrap_or(TimeDelta::MAX)
}

/// Timestamps of admitted calls still inside one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLog {
    span: Duration,
    hits: VecDeque<DateTime<Utc>>,
}

impl WindowLog {
    fn new(span: Duration) -> Self {
        Self {
            span,
            hits: VecDeque::new(),
        }
    }

    /// Keeps only hits with `now - hit < span`.
    fn prune(&mut self, now: DateTime<Utc>) {
        let span = to_delta(self.span);
        self.hits.retain(|hit| now.signed_duration_since(*hit) < span);
    }

    fn oldest(&self) -> Option<DateTime<Utc>> {
        self.hits.iter().min().copied()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Per-(caller, feature) record of admitted calls, one log per period.
///
/// Created lazily on a caller's first call. Not durable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerState {
    windows: BTreeMap<WindowPeriod, WindowLog>,
}

impl CallerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a call at `now` may proceed and records it if so.
    ///
    /// Windows are checked shortest first; the first full one is reported and
    /// no later window is evaluated. An admitted call is stamped into every
    /// configured window.
    pub fn admit(&mut self, limits: &FeatureLimits, now: DateTime<Utc>) -> Verdict {
        for (period, limit) in limits.iter() {
            let log = self
                .windows
                .entry(period)
                .or_insert_with(|| WindowLog::new(limit.window));
            log.span = limit.window;
            log.prune(now);

            if log.len() >= limit.threshold as usize {
                let oldest = log.oldest().unwrap_or(now);
                let reset_at = oldest
                    .checked_add_signed(to_delta(limit.window))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                let retry_after = reset_at
                    .signed_duration_since(now)
                    .to_std()
                    .unwrap_or(Duration::ZERO);

                return Verdict::Denied(RateLimitExceeded {
                    period,
                    threshold: limit.threshold,
                    reset_at,
                    retry_after,
                });
            }
        }

        let remaining = limits
            .iter()
            .map(|(period, limit)| {
                let log = self
                    .windows
                    .entry(period)
                    .or_insert_with(|| WindowLog::new(limit.window));
                log.hits.push_back(now);
                (period, limit.threshold.saturating_sub(log.len() as u32))
            })
            .collect();

        Verdict::Allowed(Admission { remaining })
    }

    /// Drops expired hits from every window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        for log in self.windows.values_mut() {
            log.prune(now);
        }
    }

    /// True when no window holds a live hit at `now`.
    pub fn is_idle(&self, now: DateTime<Utc>) -> bool {
        self.windows.values().all(|log| {
            let span = to_delta(log.span);
            log.hits
                .iter()
                .all(|hit| now.signed_duration_since(*hit) >= span)
        })
    }

    /// Recorded hits for `period`, including ones not yet pruned.
    pub fn count(&self, period: WindowPeriod) -> usize {
        self.windows.get(&period).map_or(0, WindowLog::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WindowLimit;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn chatbot() -> FeatureLimits {
        FeatureLimits::new()
            .with(WindowPeriod::Minute, WindowLimit::new(4, Duration::from_millis(60_000)))
            .with(WindowPeriod::Hour, WindowLimit::new(10, Duration::from_millis(3_600_000)))
            .with(WindowPeriod::Day, WindowLimit::new(15, Duration::from_millis(86_400_000)))
    }

    fn minute_and_hour(minute: u32, hour: u32) -> FeatureLimits {
        FeatureLimits::new()
            .with(WindowPeriod::Minute, WindowLimit::per(WindowPeriod::Minute, minute))
            .with(WindowPeriod::Hour, WindowLimit::per(WindowPeriod::Hour, hour))
    }

    #[test]
    fn chatbot_scenario() {
        let limits = chatbot();
        let mut state = CallerState::new();

        for t in 0..4 {
            assert!(state.admit(&limits, at(t)).is_allowed(), "call at t={t}");
        }

        let denied = state.admit(&limits, at(4)).into_result().unwrap_err();
        assert_eq!(denied.period, WindowPeriod::Minute);
        assert_eq!(denied.reset_at, at(60_000));
        assert_eq!(denied.retry_after, Duration::from_millis(59_996));

        let admitted = state.admit(&limits, at(60_001)).into_result().unwrap();
        assert_eq!(admitted.remaining(WindowPeriod::Hour), Some(5));
        assert_eq!(admitted.remaining(WindowPeriod::Day), Some(10));
    }

    #[test]
    fn denial_after_threshold_and_rollover() {
        let limits = FeatureLimits::new().with(
            WindowPeriod::Minute,
            WindowLimit::new(3, Duration::from_millis(1_000)),
        );
        let mut state = CallerState::new();

        for _ in 0..3 {
            assert!(state.admit(&limits, at(100)).is_allowed());
        }
        assert!(!state.admit(&limits, at(1_099)).is_allowed());
        assert!(state.admit(&limits, at(1_101)).is_allowed());
    }

    #[test]
    fn shortest_breached_window_is_reported() {
        let limits = minute_and_hour(2, 5);
        let mut state = CallerState::new();

        assert!(state.admit(&limits, at(0)).is_allowed());
        assert!(state.admit(&limits, at(10)).is_allowed());

        let denied = state.admit(&limits, at(20)).into_result().unwrap_err();
        assert_eq!(denied.period, WindowPeriod::Minute);
        assert_eq!(denied.threshold, 2);
        assert_eq!(state.count(WindowPeriod::Hour), 2);
    }

    #[test]
    fn longer_window_reported_once_shorter_has_room() {
        let limits = minute_and_hour(2, 3);
        let mut state = CallerState::new();

        assert!(state.admit(&limits, at(0)).is_allowed());
        assert!(state.admit(&limits, at(1)).is_allowed());
        assert!(state.admit(&limits, at(70_000)).is_allowed());

        let denied = state.admit(&limits, at(70_001)).into_result().unwrap_err();
        assert_eq!(denied.period, WindowPeriod::Hour);
        assert_eq!(denied.reset_at, at(3_600_000));
    }

    #[test]
    fn admitted_call_is_stamped_into_every_window() {
        let limits = minute_and_hour(2, 5);
        let mut state = CallerState::new();

        let first = state.admit(&limits, at(0)).into_result().unwrap();
        assert_eq!(first.remaining(WindowPeriod::Minute), Some(1));
        assert_eq!(first.remaining(WindowPeriod::Hour), Some(4));
        assert_eq!(state.count(WindowPeriod::Minute), 1);
        assert_eq!(state.count(WindowPeriod::Hour), 1);
    }

    #[test]
    fn denied_call_is_not_recorded() {
        let limits = minute_and_hour(1, 5);
        let mut state = CallerState::new();

        assert!(state.admit(&limits, at(0)).is_allowed());
        assert!(!state.admit(&limits, at(1)).is_allowed());
        assert_eq!(state.count(WindowPeriod::Hour), 1);
    }

    #[test]
    fn retry_exactly_at_reset_is_admitted() {
        let limits = FeatureLimits::new().with(
            WindowPeriod::Minute,
            WindowLimit::per(WindowPeriod::Minute, 1),
        );
        let mut state = CallerState::new();

        assert!(state.admit(&limits, at(5_000)).is_allowed());
        let denied = state.admit(&limits, at(64_999)).into_result().unwrap_err();
        assert_eq!(denied.reset_at, at(65_000));
        assert_eq!(denied.retry_after, Duration::from_millis(1));

        assert!(state.admit(&limits, denied.reset_at).is_allowed());
    }

    #[test]
    fn idle_once_longest_window_has_rolled_over() {
        let limits = minute_and_hour(5, 5);
        let mut state = CallerState::new();
        assert!(state.admit(&limits, at(0)).is_allowed());

        assert!(!state.is_idle(at(60_000)));
        assert!(!state.is_idle(at(3_599_999)));
        assert!(state.is_idle(at(3_600_000)));

        state.prune(at(3_600_000));
        assert_eq!(state.count(WindowPeriod::Minute), 0);
        assert_eq!(state.count(WindowPeriod::Hour), 0);
    }

    #[test]
    fn survives_serialization() {
        let limits = chatbot();
        let mut state = CallerState::new();
        state.admit(&limits, at(1));
        state.admit(&limits, at(2));

        let json = serde_json::to_string(&state).unwrap();
        let mut restored: CallerState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.count(WindowPeriod::Day), 2);
        assert!(restored.admit(&limits, at(3)).is_allowed());
    }
}
