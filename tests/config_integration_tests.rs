use copilot_gateway::config::rate_limits::load_rate_limits;
use copilot_gateway::config::validation::ConfigValidator;
use copilot_gateway::models::settings::Settings;
use std::collections::HashMap;
use std::io::Write;

fn settings_with(rate_limits: HashMap<String, Vec<copilot_gateway::models::settings::RateLimitRule>>) -> Settings {
    Settings {
        refresh_tokens: vec!["gho_abc123".to_string()],
        active_token_index: 0,
        editor_version: "vscode/1.97.2".to_string(),
        max_tokens: 4096,
        timeout_seconds: 60,
        sleep_between_calls_ms: 0,
        record_traffic: false,
        host: "127.0.0.1".to_string(),
        port: 8080,
        log_level: "info".to_string(),
        rate_limits,
    }
}

#[test]
fn a_rate_limits_file_loads_and_passes_comprehensive_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"gpt-4": [{{"window_minutes": 1, "requests": 10, "behavior": "delay"}}]}}"#
    )
    .unwrap();

    let rules = load_rate_limits(file.path().to_str().unwrap()).unwrap();
    let settings = settings_with(rules);

    let result = ConfigValidator::validate_comprehensive(&settings);
    assert!(result.is_valid);
    assert!(result.warnings.iter().all(|w| !w.contains("unthrottled")));
}

#[test]
fn missing_rate_limits_file_still_passes_validation_with_an_unthrottled_warning() {
    let rules = load_rate_limits("./definitely-not-here.json").unwrap();
    let settings = settings_with(rules);

    let result = ConfigValidator::validate_comprehensive(&settings);
    assert!(result.is_valid);
    assert!(result.warnings.iter().any(|w| w.contains("unthrottled")));
}

#[test]
fn a_rule_with_no_dimension_set_is_accepted_but_warned_about() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"gpt-4": [{{"window_minutes": 5}}]}}"#).unwrap();

    let rules = load_rate_limits(file.path().to_str().unwrap()).unwrap();
    let settings = settings_with(rules);

    let result = ConfigValidator::validate_comprehensive(&settings);
    assert!(result.is_valid);
    assert!(result.warnings.iter().any(|w| w.contains("never trigger")));
}
