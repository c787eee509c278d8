use chrono::{DateTime, Utc};

/// Source of "now" for everything time-dependent.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
