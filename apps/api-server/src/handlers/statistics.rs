//! CV headline statistics endpoint, limited per user rather than per IP.

use actix_web::{HttpResponse, web};
use vitae_core::domain::Feature;
use vitae_core::ports::ChatMessage;
use vitae_shared::dto::{StatisticsRequest, StatisticsResponse};

use super::{complete, prompts, remaining_quota};
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::apply_remaining_headers;
use crate::state::AppState;

/// POST /api/generate-statistics
pub async fn generate_statistics(
    state: web::Data<AppState>,
    body: web::Json<StatisticsRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();

    // The user id is the bucket key, so it must be present before limiting.
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }

    let admission = state
        .limiter
        .check(Feature::Statistics.as_str(), user_id)
        .await?;

    if request.cv_context.trim().is_empty() {
        return Err(AppError::NotFound("CV not found for this user".to_string()));
    }

    tracing::info!(user_id, "Generating CV statistics");

    let text = complete(
        &state,
        prompts::STATISTICS_SYSTEM.to_string(),
        vec![ChatMessage::user(prompts::statistics_user(&request.cv_context))],
        None,
    )
    .await?;

    let statistics = prompts::parse_statistics(&text)
        .ok_or_else(|| AppError::BadGateway("Invalid statistics format from model".to_string()))?;

    let mut response = HttpResponse::Ok().json(StatisticsResponse {
        statistics,
        remaining: admission.as_ref().map(remaining_quota),
    });
    if let Some(admission) = &admission {
        apply_remaining_headers(response.headers_mut(), admission);
    }
    Ok(response)
}
