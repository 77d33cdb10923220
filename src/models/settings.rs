//! Domain types shared across the gateway: runtime settings, rate-limit
//! rules, and the session token exchanged with the upstream provider.

use serde::{Deserialize, Serialize};

/// What a [`RateLimitRule`] does once its limit is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBehavior {
    /// Reject the request with [`crate::models::error::ProxyError::RateLimitExceeded`].
    Error,
    /// Compute a delay and let the caller decide whether to wait.
    Delay,
}

/// A single sliding-window limit for one model.
///
/// At least one of `requests`, `input_tokens`, `output_tokens`, or
/// `total_tokens` is expected to be set; a rule with none of them configured
/// never triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub window_minutes: u32,
    #[serde(default)]
    pub requests: Option<u64>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default = "default_behavior")]
    pub behavior: RateLimitBehavior,
}

fn default_behavior() -> RateLimitBehavior {
    RateLimitBehavior::Error
}

/// Upstream-issued identity used to resolve the provider's API base once at
/// startup and attach credentials to every outgoing request.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: i64,
    #[serde(default)]
    pub endpoints: Option<Endpoints>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    pub api: String,
}

/// Process-wide runtime configuration, loaded once at startup from
/// environment variables plus an external `rate_limits.json`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub refresh_tokens: Vec<String>,
    pub active_token_index: usize,
    pub editor_version: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub sleep_between_calls_ms: u64,
    pub record_traffic: bool,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub rate_limits: std::collections::HashMap<String, Vec<RateLimitRule>>,
}

impl Settings {
    /// Structural validation independent of environment/filesystem access;
    /// see [`crate::config::validation`] for the comprehensive pass run at
    /// startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.refresh_tokens.is_empty() {
            return Err("REFRESH_TOKEN environment variable is required".to_string());
        }
        for token in &self.refresh_tokens {
            if !token.starts_with("gho_") {
                return Err(format!(
                    "all refresh tokens must start with 'gho_', invalid token: {}...",
                    &token.get(..4.min(token.len())).unwrap_or("")
                ));
            }
        }
        if self.active_token_index >= self.refresh_tokens.len() {
            return Err(format!(
                "active token index {} is out of range (0-{})",
                self.active_token_index,
                self.refresh_tokens.len().saturating_sub(1)
            ));
        }
        for (model, rules) in &self.rate_limits {
            for rule in rules {
                if rule.window_minutes == 0 {
                    return Err(format!(
                        "rate limit rule for '{model}' has window_minutes = 0"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_settings() -> Settings {
        Settings {
            refresh_tokens: vec!["gho_abc123".to_string()],
            active_token_index: 0,
            editor_version: "vscode/1.97.2".to_string(),
            max_tokens: 10240,
            timeout_seconds: 300,
            sleep_between_calls_ms: 0,
            record_traffic: false,
            host: "0.0.0.0".to_string(),
            port: 11437,
            log_level: "INFO".to_string(),
            rate_limits: HashMap::new(),
        }
    }

    #[test]
    fn rejects_empty_refresh_tokens() {
        let mut s = base_settings();
        s.refresh_tokens.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_token_without_prefix() {
        let mut s = base_settings();
        s.refresh_tokens = vec!["not-a-token".to_string()];
        assert!(s.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut s = base_settings();
        s.active_token_index = 5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_settings() {
        assert!(base_settings().validate().is_ok());
    }
}
