//! Middleware modules.

pub mod admin;
pub mod client_ip;
pub mod error;
pub mod rate_limit;
