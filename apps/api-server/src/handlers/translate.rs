//! Experience translation endpoint.

use actix_web::{HttpResponse, web};
use vitae_core::ports::ChatMessage;
use vitae_shared::dto::{ExperienceText, TranslateRequest, TranslateResponse};

use super::{complete, prompts};
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// POST /api/translate
///
/// Unparseable model output falls back to the source text.
pub async fn translate(
    state: web::Data<AppState>,
    body: web::Json<TranslateRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();

    let system = prompts::translate_system(request.target_language).to_string();
    let user = prompts::translate_user(
        &request.text,
        request.target_language,
        request.context.as_deref(),
    );
    let text = complete(&state, system, vec![ChatMessage::user(user)], None).await?;

    let translation =
        match serde_json::from_str::<ExperienceText>(prompts::extract_json_object(&text)) {
            Ok(translation) => translation,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable translation, returning source text");
                request.text
            }
        };

    Ok(HttpResponse::Ok().json(TranslateResponse { translation }))
}
