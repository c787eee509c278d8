//! Domain types - periods, limits, verdicts and the admission algorithm.

mod feature;
mod limits;
mod period;
mod verdict;
mod window;

pub use feature::{Feature, KeyStrategy, default_limits_for};
pub use limits::{
    FeatureLimits, LimitsChange, LimitsRecord, LimitsUpdate, MAX_THRESHOLD, MIN_THRESHOLD,
    Thresholds, WindowLimit,
};
pub use period::WindowPeriod;
pub use verdict::{Admission, RateLimitExceeded, Verdict};
pub use window::{CallerState, WindowLog};
