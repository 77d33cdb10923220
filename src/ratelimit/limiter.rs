//! Per-model sliding-window rate limiting over both request count and token
//! consumption, with two enforcement behaviors and a proportional,
//! bounded back-off for token-rate violations.

use crate::models::error::ProxyError;
use crate::models::settings::{RateLimitBehavior, RateLimitRule};
use crate::ratelimit::usage_store::UsageStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Hard ceiling on any computed token-rate delay. Request-rate delays are
/// deliberately left uncapped, matching the asymmetry of the system this
/// proxy replaces (see DESIGN.md).
const MAX_DELAY_SECONDS: f64 = 60.0;

struct LimiterState {
    rules: HashMap<String, Vec<RateLimitRule>>,
    /// (model, window_minutes) -> timestamp -> admissions recorded at that second.
    counters: HashMap<(String, u32), BTreeMap<i64, u64>>,
    next_allowed_at: HashMap<String, i64>,
}

pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(rules: HashMap<String, Vec<RateLimitRule>>) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                rules,
                counters: HashMap::new(),
                next_allowed_at: HashMap::new(),
            }),
        }
    }

    pub fn add_rule(&self, model: impl Into<String>, rule: RateLimitRule) {
        let mut state = self.state.lock().unwrap();
        state.rules.entry(model.into()).or_default().push(rule);
    }

    /// Admits or delays based on request-frequency rules and any armed
    /// token-rate carry-over. Does not mutate counters; call
    /// [`Self::record_request`] separately once the caller has decided to
    /// actually proceed.
    pub fn check_request(&self, model: &str, now: i64) -> Result<Option<f64>, ProxyError> {
        let mut state = self.state.lock().unwrap();

        let mut max_delay = state
            .next_allowed_at
            .get(model)
            .map(|&na| (na - now).max(0) as f64)
            .unwrap_or(0.0);

        let rules = state.rules.get(model).cloned().unwrap_or_default();
        for rule in &rules {
            let Some(limit) = rule.requests else { continue };
            if limit == 0 {
                continue;
            }
            let window_secs = rule.window_minutes as i64 * 60;
            let key = (model.to_string(), rule.window_minutes);
            let counter = state.counters.entry(key).or_default();
            prune(counter, now - 2 * window_secs);

            let window_start = now - window_secs;
            let count_in_window: u64 = counter.range(window_start..=now).map(|(_, c)| *c).sum();

            if count_in_window >= limit {
                match rule.behavior {
                    RateLimitBehavior::Error => {
                        return Err(ProxyError::RateLimitExceeded {
                            model: model.to_string(),
                            reason: format!(
                                "{count_in_window} requests in the last {}m (limit {limit})",
                                rule.window_minutes
                            ),
                        });
                    }
                    RateLimitBehavior::Delay => {
                        let delay = needed_request_delay(counter, window_start, now, limit, window_secs);
                        if delay > max_delay {
                            max_delay = delay;
                        }
                    }
                }
            }
        }

        Ok(if max_delay > 0.0 { Some(max_delay) } else { None })
    }

    /// Increments the request counter for every requests-bearing rule on
    /// `model`. Intentionally not atomic with [`Self::check_request`]; see
    /// DESIGN.md for why the resulting race is accepted.
    pub fn record_request(&self, model: &str, now: i64) {
        let mut state = self.state.lock().unwrap();
        let rules = state.rules.get(model).cloned().unwrap_or_default();
        for rule in rules {
            if rule.requests.is_none() {
                continue;
            }
            let key = (model.to_string(), rule.window_minutes);
            let counter = state.counters.entry(key).or_default();
            *counter.entry(now).or_insert(0) += 1;
        }
    }

    /// Consults `usage` over each rule's sliding window and applies the
    /// same Error/Delay policy on the token dimensions. On a Delay
    /// violation, arms `next_allowed_at` for subsequent `check_request`
    /// calls. Does not itself consult `next_allowed_at` (see DESIGN.md for
    /// why this asymmetry with `check_request` is preserved).
    pub fn check_tokens(
        &self,
        model: &str,
        now: i64,
        usage: &dyn UsageStore,
    ) -> Result<Option<f64>, ProxyError> {
        let rules = {
            let state = self.state.lock().unwrap();
            state.rules.get(model).cloned().unwrap_or_default()
        };

        let mut max_delay = 0.0_f64;
        for rule in &rules {
            let window_secs = rule.window_minutes as i64 * 60;
            let usage_in_window = usage.query(now - window_secs, now, Some(model));

            let Some(ratio) = violation_ratio(rule, &usage_in_window) else {
                continue;
            };

            match rule.behavior {
                RateLimitBehavior::Error => {
                    return Err(ProxyError::RateLimitExceeded {
                        model: model.to_string(),
                        reason: format!(
                            "token usage ratio {ratio:.2} exceeds limit in the last {}m",
                            rule.window_minutes
                        ),
                    });
                }
                RateLimitBehavior::Delay => {
                    let clamped_ratio = ratio.min(2.0);
                    let delay =
                        ((rule.window_minutes as f64 * 60.0) * (clamped_ratio - 1.0)).clamp(0.0, MAX_DELAY_SECONDS);
                    if delay > max_delay {
                        max_delay = delay;
                    }
                }
            }
        }

        if max_delay > 0.0 {
            let mut state = self.state.lock().unwrap();
            let next_allowed = now + max_delay as i64;
            let entry = state.next_allowed_at.entry(model.to_string()).or_insert(next_allowed);
            *entry = (*entry).max(next_allowed);
            Ok(Some(max_delay))
        } else {
            Ok(None)
        }
    }
}

/// Drops counter entries older than `cutoff`, keeping the map bounded
/// without ever discarding anything still inside an active window.
fn prune(counter: &mut BTreeMap<i64, u64>, cutoff: i64) {
    let stale: Vec<i64> = counter.range(..cutoff).map(|(&ts, _)| ts).collect();
    for ts in stale {
        counter.remove(&ts);
    }
}

/// `(T[limit-1] + window) - now`, clamped to >= 0, where `T` is the
/// descending-sorted timestamps observed in the window (each timestamp
/// repeated once per admission recorded at that second).
fn needed_request_delay(
    counter: &BTreeMap<i64, u64>,
    window_start: i64,
    now: i64,
    limit: u64,
    window_secs: i64,
) -> f64 {
    let mut timestamps: Vec<i64> = Vec::new();
    for (&ts, &count) in counter.range(window_start..=now) {
        timestamps.extend(std::iter::repeat(ts).take(count as usize));
    }
    timestamps.sort_unstable_by(|a, b| b.cmp(a));

    let idx = (limit as usize).saturating_sub(1);
    match timestamps.get(idx) {
        Some(&t) => ((t + window_secs) - now).max(0) as f64,
        None => 0.0,
    }
}

/// Picks the ratio to report for a violated rule, preferring the total
/// dimension, then input, then output; returns `None` if no configured
/// dimension is actually exceeded.
fn violation_ratio(
    rule: &RateLimitRule,
    usage: &crate::ratelimit::usage_store::UsageQueryResult,
) -> Option<f64> {
    let dims = [
        (rule.total_tokens, usage.total_tokens),
        (rule.input_tokens, usage.total_input_tokens),
        (rule.output_tokens, usage.total_output_tokens),
    ];

    let mut violated = false;
    let mut preferred_ratio = None;
    for (limit, used) in dims {
        let Some(limit) = limit else { continue };
        if limit == 0 {
            continue;
        }
        if used > limit {
            violated = true;
        }
        if preferred_ratio.is_none() {
            preferred_ratio = Some(used as f64 / limit as f64);
        }
    }
    if violated {
        preferred_ratio
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::usage_store::InMemoryUsageStore;

    fn rule(window_minutes: u32, requests: Option<u64>, behavior: RateLimitBehavior) -> RateLimitRule {
        RateLimitRule {
            window_minutes,
            requests,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            behavior,
        }
    }

    #[test]
    fn admits_under_the_limit() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule("gpt-4", rule(1, Some(2), RateLimitBehavior::Error));
        assert!(limiter.check_request("gpt-4", 1_000).unwrap().is_none());
        limiter.record_request("gpt-4", 1_000);
        assert!(limiter.check_request("gpt-4", 1_001).unwrap().is_none());
    }

    #[test]
    fn error_behavior_rejects_over_limit() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule("gpt-4", rule(1, Some(1), RateLimitBehavior::Error));
        limiter.record_request("gpt-4", 1_000);
        let err = limiter.check_request("gpt-4", 1_001).unwrap_err();
        assert!(matches!(err, ProxyError::RateLimitExceeded { .. }));
    }

    #[test]
    fn delay_behavior_computes_needed_wait() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule("gpt-4", rule(1, Some(1), RateLimitBehavior::Delay));
        limiter.record_request("gpt-4", 1_000);
        let delay = limiter.check_request("gpt-4", 1_010).unwrap();
        // window = 60s, one admission at t=1000; next slot opens at 1060.
        assert_eq!(delay, Some(50.0));
    }

    #[test]
    fn pruning_drops_entries_older_than_twice_the_window() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule("gpt-4", rule(1, Some(100), RateLimitBehavior::Delay));
        limiter.record_request("gpt-4", 0);
        // Far beyond 2x window (120s): a check should prune the stale entry.
        limiter.check_request("gpt-4", 10_000).unwrap();
        let state = limiter.state.lock().unwrap();
        let counter = &state.counters[&("gpt-4".to_string(), 1)];
        assert!(counter.is_empty());
    }

    #[test]
    fn check_tokens_delay_is_capped_at_max_delay_seconds() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule(
            "gpt-4",
            RateLimitRule {
                window_minutes: 60,
                requests: None,
                input_tokens: None,
                output_tokens: None,
                total_tokens: Some(100),
                behavior: RateLimitBehavior::Delay,
            },
        );
        let usage = InMemoryUsageStore::new();
        usage.record("gpt-4", 10_000, 0, 0);
        let delay = limiter.check_tokens("gpt-4", 0, &usage).unwrap();
        assert_eq!(delay, Some(MAX_DELAY_SECONDS));
    }

    #[test]
    fn check_tokens_error_behavior_raises() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule(
            "gpt-4",
            RateLimitRule {
                window_minutes: 60,
                requests: None,
                input_tokens: None,
                output_tokens: None,
                total_tokens: Some(100),
                behavior: RateLimitBehavior::Error,
            },
        );
        let usage = InMemoryUsageStore::new();
        usage.record("gpt-4", 200, 0, 0);
        let err = limiter.check_tokens("gpt-4", 0, &usage).unwrap_err();
        assert!(matches!(err, ProxyError::RateLimitExceeded { .. }));
    }

    #[test]
    fn check_tokens_arms_next_allowed_at_for_check_request() {
        let limiter = RateLimiter::new(HashMap::new());
        limiter.add_rule(
            "gpt-4",
            RateLimitRule {
                window_minutes: 1,
                requests: None,
                input_tokens: None,
                output_tokens: None,
                total_tokens: Some(10),
                behavior: RateLimitBehavior::Delay,
            },
        );
        let usage = InMemoryUsageStore::new();
        usage.record("gpt-4", 15, 0, 0); // ratio 1.5 -> delay = 60*0.5 = 30s
        limiter.check_tokens("gpt-4", 0, &usage).unwrap();
        let delay = limiter.check_request("gpt-4", 10).unwrap();
        assert_eq!(delay, Some(20.0));
    }
}
