//! Operator endpoints for the per-feature limits table.

use actix_web::{HttpResponse, web};
use serde::Serialize;
use vitae_core::domain::{LimitsUpdate, Thresholds};
use vitae_infra::limits::CacheStats;
use vitae_shared::ApiResponse;
use vitae_shared::dto::UpdateLimitsRequest;

use crate::middleware::admin::AdminIdentity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_buckets: Option<usize>,
}

/// GET /api/admin/api-limits
pub async fn list_limits(
    _admin: AdminIdentity,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let records = state.limiter.resolver().source().list().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(records)))
}

/// POST /api/admin/api-limits
///
/// The feature's cache entry is evicted before responding so the next call
/// on any route sees the new thresholds.
pub async fn update_limits(
    admin: AdminIdentity,
    state: web::Data<AppState>,
    body: web::Json<UpdateLimitsRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner();
    let update = LimitsUpdate {
        feature_name: request.feature_name.trim().to_string(),
        thresholds: Thresholds::new(
            request.limit_per_minute,
            request.limit_per_hour,
            request.limit_per_day,
        ),
    };
    update.validate()?;

    let change = state
        .limiter
        .resolver()
        .source()
        .update(&update, &admin.actor)
        .await?;
    state.limiter.invalidate(Some(&change.feature)).await;

    tracing::info!(
        feature = %change.feature,
        actor = %admin.actor,
        old = ?change.old_limits,
        new = ?change.new_limits,
        "Rate limits updated"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        change,
        "Limits updated successfully",
    )))
}

/// GET /api/admin/api-limits/cache
pub async fn cache_stats(_admin: AdminIdentity, state: web::Data<AppState>) -> HttpResponse {
    let response = CacheStatsResponse {
        cache: state.limiter.cache_stats().await,
        tracked_buckets: state.limiter.tracked_buckets().await,
    };
    HttpResponse::Ok().json(ApiResponse::ok(response))
}

/// DELETE /api/admin/api-limits/cache
pub async fn clear_cache(_admin: AdminIdentity, state: web::Data<AppState>) -> HttpResponse {
    state.limiter.invalidate(None).await;
    tracing::info!("Limits cache cleared");
    HttpResponse::NoContent().finish()
}
