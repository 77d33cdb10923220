//! Narrow, in-process implementation of the token-usage ledger the limiter
//! queries for its sliding-window token-rate checks.
//!
//! Durability and the historical-usage-report surface built on top of this
//! data are out of scope here; this is deliberately the minimum needed to
//! make [`crate::ratelimit::limiter::RateLimiter::check_tokens`] real.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct UsageQueryResult {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub record_count: u64,
}

#[derive(Debug, Clone)]
struct UsageRecord {
    timestamp: i64,
    model: String,
    input_tokens: u64,
    output_tokens: u64,
}

/// Append-only, time-range-queryable record of token usage per model.
pub trait UsageStore: Send + Sync {
    fn record(&self, model: &str, input_tokens: u64, output_tokens: u64, now: i64);
    fn query(&self, start: i64, end: i64, model: Option<&str>) -> UsageQueryResult;
    fn list_models(&self) -> Vec<String>;
}

/// Mutex-guarded `Vec` backing. Good enough for the lifetime of one process;
/// makes no durability guarantee across restarts.
#[derive(Default)]
pub struct InMemoryUsageStore {
    records: Mutex<Vec<UsageRecord>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for InMemoryUsageStore {
    fn record(&self, model: &str, input_tokens: u64, output_tokens: u64, now: i64) {
        self.records.lock().unwrap().push(UsageRecord {
            timestamp: now,
            model: model.to_string(),
            input_tokens,
            output_tokens,
        });
    }

    fn query(&self, start: i64, end: i64, model: Option<&str>) -> UsageQueryResult {
        let records = self.records.lock().unwrap();
        let mut result = UsageQueryResult::default();
        for record in records.iter() {
            if record.timestamp < start || record.timestamp > end {
                continue;
            }
            if let Some(m) = model {
                if record.model != m {
                    continue;
                }
            }
            result.total_input_tokens += record.input_tokens;
            result.total_output_tokens += record.output_tokens;
            result.total_tokens += record.input_tokens + record.output_tokens;
            result.record_count += 1;
        }
        result
    }

    fn list_models(&self) -> Vec<String> {
        let records = self.records.lock().unwrap();
        let mut models: Vec<String> = records.iter().map(|r| r.model.clone()).collect();
        models.sort();
        models.dedup();
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_total_as_input_plus_output() {
        let store = InMemoryUsageStore::new();
        store.record("gpt-4", 100, 50, 1_000);
        let result = store.query(0, 2_000, Some("gpt-4"));
        assert_eq!(result.total_input_tokens, 100);
        assert_eq!(result.total_output_tokens, 50);
        assert_eq!(result.total_tokens, 150);
        assert_eq!(result.record_count, 1);
    }

    #[test]
    fn query_filters_by_time_range_and_model() {
        let store = InMemoryUsageStore::new();
        store.record("gpt-4", 10, 10, 100);
        store.record("gpt-4", 10, 10, 10_000);
        store.record("gpt-3.5", 10, 10, 150);

        let result = store.query(0, 200, Some("gpt-4"));
        assert_eq!(result.record_count, 1);
        assert_eq!(result.total_tokens, 20);
    }

    #[test]
    fn query_with_no_matching_records_is_zeroed() {
        let store = InMemoryUsageStore::new();
        let result = store.query(0, 100, Some("nonexistent"));
        assert_eq!(result.total_tokens, 0);
        assert_eq!(result.record_count, 0);
    }

    #[test]
    fn list_models_is_distinct_and_sorted() {
        let store = InMemoryUsageStore::new();
        store.record("gpt-4", 1, 1, 1);
        store.record("gpt-3.5", 1, 1, 2);
        store.record("gpt-4", 1, 1, 3);
        assert_eq!(store.list_models(), vec!["gpt-3.5", "gpt-4"]);
    }
}
