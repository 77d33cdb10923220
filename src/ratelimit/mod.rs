//! Sliding-window rate limiting over request count and token consumption.
//!
//! - [`limiter`] - [`limiter::RateLimiter`], the enforcement engine.
//! - [`usage_store`] - [`usage_store::UsageStore`], the token-usage ledger
//!   the limiter's token-rate checks query against.

pub mod limiter;
pub mod usage_store;
