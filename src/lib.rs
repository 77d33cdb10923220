//! A local reverse proxy that brokers chat-completion requests to an
//! upstream chat-completion provider.
//!
//! It hides the upstream's short-lived bearer-token issuance behind a
//! rotating pool of long-lived refresh credentials, enforces configurable
//! per-model sliding-window rate limits on both request count and token
//! consumption, and streams Server-Sent Events back to clients while
//! observing usage telemetry to feed the limiter back.
//!
//! # Module Organization
//!
//! - [`config`] - environment/file-driven settings and validation
//! - [`models`] - domain types and the [`models::error::ProxyError`] taxonomy
//! - [`credentials`] - refresh-credential rotation and session-token caching
//! - [`ratelimit`] - sliding-window limiter and the usage ledger it queries
//! - [`proxy`] - request normalization, SSE framing, and the streaming pipeline
//! - [`routes`] - HTTP route handlers
//! - [`logs`] - logging configuration
//!
//! # Environment Variables
//!
//! - `REFRESH_TOKEN`: comma-separated `gho_`-prefixed refresh credentials (required)
//! - `ACTIVE_TOKEN_INDEX`, `EDITOR_VERSION`, `MAX_TOKENS`, `TIMEOUT_SECONDS`
//! - `SLEEP_BETWEEN_CALLS_MS`, `RECORD_TRAFFIC`
//! - `PROXY_HOST`, `PROXY_PORT`, `PROXY_LOG_LEVEL`
//! - `RATE_LIMITS_PATH`: path to the per-model rate-limit rules (default `./rate_limits.json`)

pub mod config;
pub mod credentials;
pub mod logs;
pub mod models;
pub mod proxy;
pub mod ratelimit;
pub mod routes;
