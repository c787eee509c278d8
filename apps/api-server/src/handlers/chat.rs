//! CV chatbot endpoint.

use actix_web::{HttpResponse, web};
use vitae_core::domain::Admission;
use vitae_core::ports::{ChatMessage, ChatRole};
use vitae_shared::dto::{ChatRequest, ChatResponse};

use super::{complete, prompts, remaining_quota};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/chat
pub async fn chat(
    state: web::Data<AppState>,
    admission: Option<web::ReqData<Admission>>,
    body: web::Json<ChatRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();

    let messages = request
        .messages
        .into_iter()
        .map(|turn| {
            let role = match turn.role.as_str() {
                "user" => ChatRole::User,
                "assistant" => ChatRole::Assistant,
                other => return Err(AppError::BadRequest(format!("Unknown role '{other}'"))),
            };
            Ok(ChatMessage {
                role,
                content: turn.content,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    if messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".to_string()));
    }

    let system = prompts::chat_system(request.language, &request.cv_context);
    let reply = complete(&state, system, messages, None).await?;

    Ok(HttpResponse::Ok().json(ChatResponse {
        reply,
        remaining: admission.map(|a| remaining_quota(&a)),
    }))
}
