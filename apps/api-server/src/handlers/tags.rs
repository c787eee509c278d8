//! Tag suggestion endpoint.

use actix_web::{HttpResponse, web};
use vitae_core::ports::ChatMessage;
use vitae_shared::dto::{SuggestTagsRequest, SuggestTagsResponse};

use super::{complete, prompts};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/suggest-tags
pub async fn suggest_tags(
    state: web::Data<AppState>,
    body: web::Json<SuggestTagsRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    if request.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".to_string()));
    }

    let system = prompts::suggest_tags_system(request.language).to_string();
    let user = prompts::suggest_tags_user(&request.title, &request.description);
    let text = complete(&state, system, vec![ChatMessage::user(user)], Some(256)).await?;

    let tags = prompts::parse_tags(&text)
        .ok_or_else(|| AppError::BadGateway("Unparseable tag suggestions".to_string()))?;

    Ok(HttpResponse::Ok().json(SuggestTagsResponse { tags }))
}
