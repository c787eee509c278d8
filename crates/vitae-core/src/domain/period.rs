use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A named rolling window a feature can be capped over.
///
/// Variants are declared shortest first; the derived `Ord` is the order in
/// which windows are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPeriod {
    Minute,
    Hour,
    Day,
}

impl WindowPeriod {
    /// Every period, in check order.
    pub const ALL: [WindowPeriod; 3] =
        [WindowPeriod::Minute, WindowPeriod::Hour, WindowPeriod::Day];

    /// Wall-clock span the period covers when no custom window is given.
    pub fn canonical_window(self) -> Duration {
        match self {
            WindowPeriod::Minute => Duration::from_secs(60),
            WindowPeriod::Hour => Duration::from_secs(60 * 60),
            WindowPeriod::Day => Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowPeriod::Minute => "minute",
            WindowPeriod::Hour => "hour",
            WindowPeriod::Day => "day",
        }
    }
}

impl fmt::Display for WindowPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowPeriod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(WindowPeriod::Minute),
            "hour" => Ok(WindowPeriod::Hour),
            "day" => Ok(WindowPeriod::Day),
            other => Err(DomainError::Validation(format!(
                "unknown window period '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_order_is_shortest_first() {
        let mut sorted = WindowPeriod::ALL;
        sorted.sort_by_key(|p| p.canonical_window());
        assert_eq!(sorted, WindowPeriod::ALL);
        assert!(WindowPeriod::Minute < WindowPeriod::Hour);
        assert!(WindowPeriod::Hour < WindowPeriod::Day);
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!("hour".parse::<WindowPeriod>().unwrap(), WindowPeriod::Hour);
        assert!("minutes".parse::<WindowPeriod>().is_err());
        assert!("Day".parse::<WindowPeriod>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&WindowPeriod::Day).unwrap();
        assert_eq!(json, "\"day\"");
    }
}
