//! Logging configuration for the proxy process.
//!
//! - [`logger`] - colorized `env_logger` setup honoring `PROXY_LOG_LEVEL` and `NO_COLOR`

pub mod logger;
