//! Comprehensive configuration validation with detailed error reporting,
//! run once at startup after [`crate::config::settings::load_settings`].

use crate::models::settings::Settings;
use log::{info, warn};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_comprehensive(settings: &Settings) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = settings.validate() {
            result.add_error(e);
        }

        if settings.record_traffic {
            result.add_warning(
                "RECORD_TRAFFIC is enabled: outgoing TLS verification is disabled".to_string(),
            );
        }

        if settings.rate_limits.is_empty() {
            result.add_warning(
                "No rate limits configured; every model is unthrottled".to_string(),
            );
        }

        for (model, rules) in &settings.rate_limits {
            for rule in rules {
                let has_limit = rule.requests.is_some()
                    || rule.input_tokens.is_some()
                    || rule.output_tokens.is_some()
                    || rule.total_tokens.is_some();
                if !has_limit {
                    result.add_warning(format!(
                        "rule for '{model}' (window {}m) sets no limit and will never trigger",
                        rule.window_minutes
                    ));
                }
            }
        }

        Self::log_validation_results(&result);
        result
    }

    fn log_validation_results(result: &ValidationResult) {
        if result.is_valid {
            info!("Configuration validation passed");
        } else {
            for error in &result.errors {
                log::error!("Validation error: {error}");
            }
        }
        for warning in &result.warnings {
            warn!("Validation warning: {warning}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_with(refresh_tokens: Vec<&str>) -> Settings {
        Settings {
            refresh_tokens: refresh_tokens.into_iter().map(String::from).collect(),
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
    fn missing_refresh_tokens_is_an_error() {
        let settings = settings_with(vec![]);
        let result = ConfigValidator::validate_comprehensive(&settings);
        assert!(!result.is_valid);
    }

    #[test]
    fn empty_rate_limits_warns_but_is_valid() {
        let settings = settings_with(vec!["gho_x"]);
        let result = ConfigValidator::validate_comprehensive(&settings);
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("unthrottled")));
    }
}
