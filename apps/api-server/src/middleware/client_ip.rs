//! Caller identity for IP-keyed features.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header::HeaderMap};
use std::future::{Ready, ready};
use std::net::SocketAddr;

use vitae_core::ports::BucketKey;

/// Resolve the client address: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the socket peer, then `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| BucketKey::UNKNOWN_CALLER.to_string())
}

/// Client IP extractor for handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for ClientIp {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientIp(client_ip(req.headers(), req.peer_addr()))))
    }
}
