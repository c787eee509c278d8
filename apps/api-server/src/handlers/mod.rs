//! HTTP handlers and route configuration.

mod admin;
mod chat;
mod fit;
mod health;
mod prompts;
mod statistics;
mod tags;
mod translate;


use actix_web::web;
use vitae_core::domain::{Admission, Feature, WindowPeriod};
use vitae_core::ports::{ChatMessage, CompletionRequest};
use vitae_shared::dto::RemainingQuota;

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::state::AppState;

/// Per-window headroom for response bodies.
pub fn remaining_quota(admission: &Admission) -> RemainingQuota {
    RemainingQuota {
        minute: admission.remaining(WindowPeriod::Minute),
        hour: admission.remaining(WindowPeriod::Hour),
        day: admission.remaining(WindowPeriod::Day),
    }
}

/// Run one completion and return its text.
async fn complete(
    state: &AppState,
    system: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
) -> AppResult<String> {
    let completion = state
        .llm
        .complete(CompletionRequest {
            system,
            messages,
            max_tokens,
        })
        .await?;

    tracing::debug!(
        model = %completion.model,
        stop_reason = ?completion.stop_reason,
        "Completion received"
    );
    Ok(completion.text)
}

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into());

    cfg.app_data(json_config).service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // IP-keyed features, limited before the body is read
            .service(
                web::resource("/chat")
                    .wrap(RateLimitMiddleware::new(Feature::Chatbot))
                    .route(web::post().to(chat::chat)),
            )
            .service(
                web::resource("/translate")
                    .wrap(RateLimitMiddleware::new(Feature::Translate))
                    .route(web::post().to(translate::translate)),
            )
            .service(
                web::resource("/suggest-tags")
                    .wrap(RateLimitMiddleware::new(Feature::SuggestTags))
                    .route(web::post().to(tags::suggest_tags)),
            )
            // Limited inside the handler, after validation
            .route("/fit-assessment", web::post().to(fit::fit_assessment))
            .route(
                "/generate-statistics",
                web::post().to(statistics::generate_statistics),
            )
            // Operator routes
            .service(
                web::scope("/admin")
                    .route("/api-limits", web::get().to(admin::list_limits))
                    .route("/api-limits", web::post().to(admin::update_limits))
                    .route("/api-limits/cache", web::get().to(admin::cache_stats))
                    .route("/api-limits/cache", web::delete().to(admin::clear_cache)),
            ),
    );
}
