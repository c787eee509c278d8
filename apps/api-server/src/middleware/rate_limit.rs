//! Rate limiting middleware for IP-keyed features.
//!
//! Wrap a scope with `RateLimitMiddleware::new(Feature::Chatbot)`; the limiter
//! is taken from `AppState` so the middleware needs no wiring of its own.

use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    web,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;

use vitae_core::domain::{Admission, Feature, WindowPeriod};

use crate::middleware::client_ip::client_ip;
use crate::middleware::error::too_many_requests;
use crate::state::AppState;

/// Add `X-RateLimit-Remaining` (tightest window) and one header per window.
pub fn apply_remaining_headers(headers: &mut HeaderMap, admission: &Admission) {
    for (period, remaining) in &admission.remaining {
        let name = match period {
            WindowPeriod::Minute => "x-ratelimit-remaining-minute",
            WindowPeriod::Hour => "x-ratelimit-remaining-hour",
            WindowPeriod::Day => "x-ratelimit-remaining-day",
        };
        headers.insert(HeaderName::from_static(name), HeaderValue::from(*remaining));
    }

    if let Some(tightest) = admission.remaining.values().min() {
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(*tightest),
        );
    }
}

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    feature: Feature,
}

impl RateLimitMiddleware {
    pub fn new(feature: Feature) -> Self {
        Self { feature }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            feature: self.feature,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    feature: Feature,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let feature = self.feature;

        Box::pin(async move {
            let limiter = match req.app_data::<web::Data<AppState>>() {
                Some(state) => state.limiter.clone(),
                None => {
                    tracing::error!("AppState not found in app data, skipping rate limit");
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
            };

            let caller = client_ip(req.headers(), req.peer_addr());

            match limiter.check(feature.as_str(), &caller).await {
                Err(exceeded) => {
                    let response = too_many_requests(&exceeded);
                    Ok(req.into_response(response).map_into_right_body())
                }
                Ok(admission) => {
                    if let Some(admission) = &admission {
                        req.extensions_mut().insert(admission.clone());
                    }

                    let mut res = service.call(req).await?;
                    if let Some(admission) = &admission {
                        apply_remaining_headers(res.headers_mut(), admission);
                    }
                    Ok(res.map_into_left_body())
                }
            }
        })
    }
}
