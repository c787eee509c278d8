//! Operator authentication for the limits administration routes.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use sha2::{Digest, Sha256};
use std::future::{Ready, ready};

use crate::middleware::error::AppError;
use crate::state::AppState;

/// Actor recorded in the limits history for token-authenticated changes.
pub const ADMIN_ACTOR: &str = "admin";

/// Proof that the request carried the operator bearer token.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub actor: String,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Constant-time comparison over SHA-256 digests of both tokens.
fn token_matches(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

impl FromRequest for AdminIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState not found in app data");
            return ready(Err(AppError::Internal("Server misconfigured".to_string())));
        };

        // Admin routes stay closed until a token is configured.
        let Some(expected) = state.admin_token.as_deref() else {
            tracing::warn!("Admin request rejected: ADMIN_API_TOKEN not set");
            return ready(Err(AppError::Unauthorized));
        };

        match bearer_token(req) {
            Some(token) if token_matches(token, expected) => ready(Ok(AdminIdentity {
                actor: ADMIN_ACTOR.to_string(),
            })),
            _ => {
                tracing::warn!("Admin request rejected: bad or missing bearer token");
                ready(Err(AppError::Unauthorized))
            }
        }
    }
}
