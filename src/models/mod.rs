//! Domain types and the error taxonomy for the gateway.
//!
//! - [`error`] - [`error::ProxyError`], mapped to HTTP responses at the edge.
//! - [`settings`] - runtime [`settings::Settings`], [`settings::RateLimitRule`],
//!   and the upstream [`settings::SessionToken`] shape.

pub mod error;
pub mod settings;
