//! # Vitae Shared
//!
//! Request and response types shared between the gateway and its clients
//! (public CV pages, the owner dashboard, the operator panel).

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, RateLimitedResponse};
