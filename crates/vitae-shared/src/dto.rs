//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// Interface language of the CV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
}

/// Headroom left per window after an admitted call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingQuota {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// POST /api/chat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub cv_context: String,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<RemainingQuota>,
}

/// Translatable fields of one work experience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceText {
    #[serde(default)]
    pub titre: String,
    #[serde(default)]
    pub entreprise: String,
    #[serde(default)]
    pub description: String,
}

/// POST /api/translate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: ExperienceText,
    pub target_language: Language,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translation: ExperienceText,
}

/// POST /api/suggest-tags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestTagsRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestTagsResponse {
    pub tags: Vec<String>,
}

/// POST /api/fit-assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitAssessmentRequest {
    pub cv_context: String,
    pub job_description: String,
    #[serde(default)]
    pub language: Language,
}

/// Structured fit analysis as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitAnalysis {
    pub overall_score: u8,
    pub strong_fit: Vec<String>,
    pub areas_for_development: Vec<String>,
    pub recommendations: Vec<String>,
    pub strong_fit_summary: String,
    pub development_summary: String,
}

impl FitAnalysis {
    /// Reject analyses with an out-of-range score, empty lists or stub summaries.
    pub fn is_complete(&self) -> bool {
        self.overall_score <= 100
            && !self.strong_fit.is_empty()
            && !self.areas_for_development.is_empty()
            && !self.recommendations.is_empty()
            && self.strong_fit_summary.chars().count() >= 10
            && self.development_summary.chars().count() >= 10
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitAssessmentResponse {
    pub analysis: FitAnalysis,
    /// Day-window headroom after this call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_analyses: Option<u32>,
}

/// POST /api/generate-statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub cv_context: String,
}

/// One headline figure for a CV, labelled in both languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvStatistic {
    pub label_fr: String,
    pub label_en: String,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub statistics: Vec<CvStatistic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<RemainingQuota>,
}

/// POST /api/admin/api-limits
///
/// A null threshold removes the cap for that period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLimitsRequest {
    pub feature_name: String,
    #[serde(default)]
    pub limit_per_minute: Option<u32>,
    #[serde(default)]
    pub limit_per_hour: Option<u32>,
    #[serde(default)]
    pub limit_per_day: Option<u32>,
}
