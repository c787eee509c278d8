//! Job fit assessment endpoint.
//!
//! Validation runs before the limiter so malformed requests cost no quota.

use actix_web::{HttpResponse, web};
use vitae_core::domain::{Feature, WindowPeriod};
use vitae_core::ports::ChatMessage;
use vitae_shared::dto::{FitAnalysis, FitAssessmentRequest, FitAssessmentResponse};

use super::{complete, prompts};
use crate::middleware::client_ip::ClientIp;
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::apply_remaining_headers;
use crate::state::AppState;

const MIN_JOB_DESCRIPTION: usize = 50;
const MAX_JOB_DESCRIPTION: usize = 10_000;

fn validate(request: &FitAssessmentRequest) -> AppResult<()> {
    if request.cv_context.trim().is_empty() {
        return Err(AppError::BadRequest("cvContext is required".to_string()));
    }

    let length = request.job_description.chars().count();
    if length < MIN_JOB_DESCRIPTION {
        return Err(AppError::BadRequest(format!(
            "Job description too short (minimum {MIN_JOB_DESCRIPTION} characters)"
        )));
    }
    if length > MAX_JOB_DESCRIPTION {
        return Err(AppError::BadRequest(format!(
            "Job description too long (maximum {MAX_JOB_DESCRIPTION} characters)"
        )));
    }
    Ok(())
}

/// POST /api/fit-assessment
pub async fn fit_assessment(
    state: web::Data<AppState>,
    client: ClientIp,
    body: web::Json<FitAssessmentRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    validate(&request)?;

    let admission = state
        .limiter
        .check(Feature::FitAssessment.as_str(), client.as_str())
        .await?;

    let system = prompts::fit_system(request.language);
    let user = prompts::fit_user(&request.cv_context, &request.job_description);
    let text = complete(&state, system, vec![ChatMessage::user(user)], Some(2048)).await?;

    let analysis: FitAnalysis = serde_json::from_str(prompts::extract_json_object(&text))
        .map_err(|e| AppError::BadGateway(format!("Failed to parse analysis: {e}")))?;
    if !analysis.is_complete() {
        return Err(AppError::BadGateway("Incomplete analysis from model".to_string()));
    }

    let mut response = HttpResponse::Ok().json(FitAssessmentResponse {
        analysis,
        remaining_analyses: admission
            .as_ref()
            .and_then(|a| a.remaining(WindowPeriod::Day)),
    });
    if let Some(admission) = &admission {
        apply_remaining_headers(response.headers_mut(), admission);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitae_shared::dto::Language;

    fn request(job_description: &str) -> FitAssessmentRequest {
        FitAssessmentRequest {
            cv_context: "Rust developer".to_string(),
            job_description: job_description.to_string(),
            language: Language::En,
        }
    }

    #[test]
    fn job_description_bounds_are_inclusive() {
        assert!(validate(&request(&"a".repeat(49))).is_err());
        assert!(validate(&request(&"a".repeat(50))).is_ok());
        assert!(validate(&request(&"a".repeat(10_000))).is_ok());
        assert!(validate(&request(&"a".repeat(10_001))).is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(validate(&request(&"é".repeat(50))).is_ok());
    }
}
