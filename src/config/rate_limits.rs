//! Loading of the external per-model rate-limit configuration file.

use crate::models::settings::RateLimitRule;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;

/// Loads `{model: [rule, ...]}` from `path`.
///
/// A missing file disables rate limiting silently (empty map) rather than
/// failing startup, matching the upstream provider's behavior of treating
/// rate limiting as an optional, additive layer.
pub fn load_rate_limits(
    path: &str,
) -> Result<HashMap<String, Vec<RateLimitRule>>, Box<dyn std::error::Error>> {
    let path = Path::new(path);
    if !path.exists() {
        warn!(
            "No rate limits file found at {}; rate limiting is disabled",
            path.display()
        );
        return Ok(HashMap::new());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read rate limits file {}: {e}", path.display()))?;
    let rules: HashMap<String, Vec<RateLimitRule>> = serde_json::from_str(&raw)
        .map_err(|e| format!("invalid rate limits JSON in {}: {e}", path.display()))?;

    debug!(
        "Loaded rate limits for {} model(s) from {}",
        rules.len(),
        path.display()
    );
    Ok(rules)
}
