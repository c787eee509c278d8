//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;
use vitae_core::DomainError;
use vitae_core::domain::RateLimitExceeded;
use vitae_core::ports::{LimitsSourceError, LlmError};
use vitae_shared::{ErrorResponse, RateLimitedResponse};

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unauthorized,
    Internal(String),
    RateLimited(RateLimitExceeded),
    /// The LLM provider answered with an error status.
    Upstream { status: u16, message: String },
    BadGateway(String),
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::RateLimited(exceeded) => write!(f, "{}", exceeded),
            AppError::Upstream { status, message } => {
                write!(f, "Upstream error {}: {}", status, message)
            }
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

/// Build the 429 response shared by the middleware and in-handler checks.
pub fn too_many_requests(exceeded: &RateLimitExceeded) -> HttpResponse {
    let body = RateLimitedResponse {
        error: "Too Many Requests".to_string(),
        message: exceeded.message(),
        period: exceeded.period.to_string(),
        limit: exceeded.threshold,
        retry_after: exceeded.reset_at_millis(),
        wait_minutes: exceeded.wait_minutes(),
    };

    // Retry-After is whole seconds, rounded up so clients never retry early.
    let retry_secs = exceeded.retry_after.as_millis().div_ceil(1000);

    HttpResponse::TooManyRequests()
        .insert_header(("Retry-After", retry_secs.to_string()))
        .insert_header(("X-RateLimit-Limit", exceeded.threshold.to_string()))
        .insert_header(("X-RateLimit-Remaining", "0"))
        .insert_header(("X-RateLimit-Reset", exceeded.reset_at_millis().to_string()))
        .json(body)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::RateLimited(exceeded) => return too_many_requests(exceeded),
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::Unauthorized => ErrorResponse::unauthorized(),
            AppError::Internal(detail) => {
                // Log internal errors
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
            AppError::Upstream { status, message } => {
                tracing::error!(status, "LLM provider error: {}", message);
                ErrorResponse::new(self.status_code().as_u16(), "Upstream Error")
                    .with_detail(message)
            }
            AppError::BadGateway(detail) => {
                tracing::error!("Bad gateway: {}", detail);
                ErrorResponse::new(502, "Bad Gateway").with_detail(detail)
            }
            AppError::ServiceUnavailable(detail) => {
                ErrorResponse::new(503, "Service Unavailable").with_detail(detail)
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<RateLimitExceeded> for AppError {
    fn from(exceeded: RateLimitExceeded) -> Self {
        AppError::RateLimited(exceeded)
    }
}

// Conversion from domain errors
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::BadRequest(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<LimitsSourceError> for AppError {
    fn from(err: LimitsSourceError) -> Self {
        match err {
            LimitsSourceError::NotFound(feature) => {
                AppError::NotFound(format!("Feature '{}' not found", feature))
            }
            LimitsSourceError::Unavailable(msg) => {
                tracing::error!("Limits source unavailable: {}", msg);
                AppError::ServiceUnavailable("Limits table unavailable".to_string())
            }
            LimitsSourceError::Timeout => {
                AppError::ServiceUnavailable("Limits table timed out".to_string())
            }
            LimitsSourceError::Decode(msg) => AppError::BadGateway(msg),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => AppError::Internal("API key not configured".to_string()),
            LlmError::Upstream { status, message } => AppError::Upstream { status, message },
            LlmError::Transport(msg) | LlmError::Decode(msg) => AppError::BadGateway(msg),
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use chrono::DateTime;
    use std::time::Duration;
    use vitae_core::domain::WindowPeriod;

    #[actix_web::test]
    async fn rate_limited_renders_retry_headers() {
        let exceeded = RateLimitExceeded {
            period: WindowPeriod::Minute,
            threshold: 4,
            reset_at: DateTime::from_timestamp_millis(60_000).unwrap(),
            retry_after: Duration::from_millis(59_500),
        };

        let response = AppError::RateLimited(exceeded).error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        assert_eq!(response.headers().get("X-RateLimit-Reset").unwrap(), "60000");

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["period"], "minute");
        assert_eq!(json["retryAfter"], 60_000);
        assert_eq!(json["waitMinutes"], 1);
    }

    #[test]
    fn upstream_status_is_passed_through() {
        let err = AppError::from(LlmError::Upstream {
            status: 529,
            message: "overloaded".to_string(),
        });
        assert_eq!(err.status_code().as_u16(), 529);

        let err = AppError::from(LlmError::NotConfigured);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
