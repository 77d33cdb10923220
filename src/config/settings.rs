//! Environment-driven configuration loading.
//!
//! Settings come entirely from environment variables, except for the
//! per-model rate-limit rules which live in an external `rate_limits.json`
//! file (see [`crate::config::rate_limits`]).
//!
//! # Environment Variables
//!
//! - `REFRESH_TOKEN`: comma-separated list of `gho_`-prefixed credentials (required)
//! - `ACTIVE_TOKEN_INDEX`: default `0`
//! - `EDITOR_VERSION`: default `vscode/1.97.2`
//! - `MAX_TOKENS`: default `10240`
//! - `TIMEOUT_SECONDS`: default `300`
//! - `SLEEP_BETWEEN_CALLS_MS`: default `0`
//! - `RECORD_TRAFFIC`: default `false`
//! - `PROXY_HOST` / `PROXY_PORT`: default `0.0.0.0` / `11437`
//! - `PROXY_LOG_LEVEL`: default `INFO`
//! - `RATE_LIMITS_PATH`: default `./rate_limits.json`; a missing file disables
//!   rate limiting silently rather than failing startup.
use crate::config::rate_limits::load_rate_limits;
use crate::models::settings::Settings;
use log::debug;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Loads [`Settings`] from the process environment plus `rate_limits.json`.
///
/// Mirrors the gateway's existing file-loading conventions (configurable
/// path, safe defaults) but the primary source here is environment
/// variables, since the upstream this proxies is fixed rather than a set of
/// user-defined routes.
pub fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let refresh_tokens: Vec<String> = std::env::var("REFRESH_TOKEN")
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let rate_limits_path =
        std::env::var("RATE_LIMITS_PATH").unwrap_or_else(|_| "./rate_limits.json".to_string());
    let rate_limits = load_rate_limits(&rate_limits_path)?;

    let settings = Settings {
        refresh_tokens,
        active_token_index: env_parse("ACTIVE_TOKEN_INDEX", 0usize),
        editor_version: env_or("EDITOR_VERSION", "vscode/1.97.2"),
        max_tokens: env_parse("MAX_TOKENS", 10240u32),
        timeout_seconds: env_parse("TIMEOUT_SECONDS", 300u64),
        sleep_between_calls_ms: env_parse("SLEEP_BETWEEN_CALLS_MS", 0u64),
        record_traffic: env_parse("RECORD_TRAFFIC", false),
        host: env_or("PROXY_HOST", "0.0.0.0"),
        port: env_parse("PROXY_PORT", 11437u16),
        log_level: env_or("PROXY_LOG_LEVEL", "INFO"),
        rate_limits,
    };

    debug!(
        "Loaded configuration: {} refresh token(s), {} rate-limited model(s)",
        settings.refresh_tokens.len(),
        settings.rate_limits.len()
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation races across tests in the same binary;
    // serialize them behind a lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("MAX_TOKENS");
        std::env::remove_var("REFRESH_TOKEN");
        std::env::remove_var("RATE_LIMITS_PATH");
        let settings = load_settings().expect("load_settings should not fail on missing file");
        assert_eq!(settings.max_tokens, 10240);
        assert!(settings.refresh_tokens.is_empty());
        assert_eq!(settings.host, "0.0.0.0");
    }

    #[test]
    fn parses_comma_separated_refresh_tokens() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("REFRESH_TOKEN", "gho_a, gho_b ,gho_c");
        std::env::remove_var("RATE_LIMITS_PATH");
        let settings = load_settings().unwrap();
        assert_eq!(settings.refresh_tokens, vec!["gho_a", "gho_b", "gho_c"]);
        std::env::remove_var("REFRESH_TOKEN");
    }
}
