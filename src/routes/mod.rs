//! HTTP route handlers.
//!
//! - [`health`] - liveness endpoint
//! - [`models`] - `GET /models` passthrough
//! - [`chat`] - `POST /chat/completions` streaming proxy

pub mod chat;
pub mod health;
pub mod models;
