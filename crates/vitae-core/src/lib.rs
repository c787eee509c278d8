//! # Vitae Core
//!
//! The domain layer of the Vitae gateway: rate-limit periods, per-feature
//! limits, the sliding-window admission check, and the ports the
//! infrastructure layer implements.
//! This crate has no infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::DomainError;
