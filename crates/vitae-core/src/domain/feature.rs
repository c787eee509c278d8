use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureLimits, Thresholds};
use crate::error::DomainError;

/// LLM-backed capability with its own rate-limit thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Chatbot,
    Translate,
    Statistics,
    FitAssessment,
    SuggestTags,
}

/// What a feature's callers are bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    ClientIp,
    UserId,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Chatbot,
        Feature::Translate,
        Feature::Statistics,
        Feature::FitAssessment,
        Feature::SuggestTags,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Chatbot => "chatbot",
            Feature::Translate => "translate",
            Feature::Statistics => "statistics",
            Feature::FitAssessment => "fit_assessment",
            Feature::SuggestTags => "suggest_tags",
        }
    }

    /// Thresholds used when the configuration source cannot be reached.
    pub fn default_thresholds(self) -> Thresholds {
        match self {
            Feature::Chatbot | Feature::Translate | Feature::SuggestTags => {
                Thresholds::new(Some(4), Some(10), Some(15))
            }
            Feature::Statistics => Thresholds::new(Some(3), Some(10), Some(20)),
            Feature::FitAssessment => Thresholds::new(Some(2), Some(5), Some(5)),
        }
    }

    pub fn default_limits(self) -> Option<FeatureLimits> {
        FeatureLimits::from_thresholds(self.default_thresholds())
    }

    pub fn key_strategy(self) -> KeyStrategy {
        match self {
            Feature::Statistics => KeyStrategy::UserId,
            _ => KeyStrategy::ClientIp,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown feature '{s}'")))
    }
}

/// Hard-coded fallback limits by feature name; `None` for unknown names.
pub fn default_limits_for(feature: &str) -> Option<FeatureLimits> {
    feature.parse::<Feature>().ok().and_then(Feature::default_limits)
}
