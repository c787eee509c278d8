//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// Caller buckets held by the window store, when it can count them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_buckets: Option<usize>,
}

/// Health check endpoint - returns server status.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        tracked_buckets: state.limiter.tracked_buckets().await,
    };

    HttpResponse::Ok().json(response)
}
