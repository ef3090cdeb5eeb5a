//! Fire-and-forget usage and search analytics

use crate::error::Result;
use crate::store::{SearchRow, Store, UsageRow};
use std::sync::Arc;

/// Records tool and search activity without ever failing the caller
pub struct AnalyticsRecorder {
    store: Arc<Store>,
}

impl AnalyticsRecorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record one tool invocation and fold its latency into the rolling
    /// category average. Failures are logged and swallowed.
    pub fn record_usage(&self, row: &UsageRow) {
        if let Err(err) = self.store.insert_usage(row) {
            tracing::warn!("Failed to record tool usage: {}", err);
        }
        if let Err(err) = self.roll_category_average(&row.category, row.latency_ms) {
            tracing::warn!("Failed to update category stats: {}", err);
        }
    }

    /// Record one search invocation and bump its popularity counter.
    /// Failures are logged and swallowed.
    pub fn record_search(&self, row: &SearchRow) {
        if let Err(err) = self.store.insert_search(row) {
            tracing::warn!("Failed to record search analytics: {}", err);
        }
        if let Err(err) = self.store.bump_popular_query(&row.query) {
            tracing::warn!("Failed to update popular queries: {}", err);
        }
    }

    // Read then write without a transaction; concurrent recorders may lose
    // an increment, which is acceptable for advisory stats
    fn roll_category_average(&self, category: &str, latency_ms: u64) -> Result<()> {
        let (count, avg) = self.store.category_stats(category)?.unwrap_or((0, 0.0));
        let new_count = count + 1;
        let new_avg = (avg * count as f64 + latency_ms as f64) / new_count as f64;
        self.store.upsert_category(category, new_count, new_avg)
    }
}

/// Stable per-caller fingerprint for one calendar day
pub fn session_fingerprint(client_ip: &str, user_agent: &str) -> String {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    let material = format!("{}|{}|{}", client_ip, user_agent, date);
    let digest = crate::sha256_hex(material.as_bytes());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(category: &str, latency_ms: u64) -> UsageRow {
        UsageRow {
            trace_id: "t-1".to_string(),
            tool_name: "db.stats".to_string(),
            category: category.to_string(),
            success: true,
            latency_ms,
            result_count: Some(1),
            error: None,
            session: "abcd".to_string(),
        }
    }

    #[test]
    fn test_record_usage_writes_log_and_category() {
        let store = Arc::new(Store::open_memory().unwrap());
        let recorder = AnalyticsRecorder::new(store.clone());

        recorder.record_usage(&usage("database", 40));

        assert_eq!(store.usage_for_tool("db.stats").unwrap().len(), 1);
        let (count, avg) = store.category_stats("database").unwrap().unwrap();
        assert_eq!(count, 1);
        assert!((avg - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_average() {
        let store = Arc::new(Store::open_memory().unwrap());
        let recorder = AnalyticsRecorder::new(store.clone());

        recorder.record_usage(&usage("database", 40));
        recorder.record_usage(&usage("database", 20));

        let (count, avg) = store.category_stats("database").unwrap().unwrap();
        assert_eq!(count, 2);
        assert!((avg - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_search_logs_and_bumps_popularity() {
        let store = Arc::new(Store::open_memory().unwrap());
        let recorder = AnalyticsRecorder::new(store.clone());

        let row = SearchRow {
            query: "refund".to_string(),
            expanded_count: 4,
            result_count: 2,
            avg_relevance: 0.3,
            cache_hit: false,
            latency_ms: 10,
            session: "abcd".to_string(),
        };
        recorder.record_search(&row);
        recorder.record_search(&row);

        assert_eq!(store.search_count_for_query("refund").unwrap(), 2);
        assert_eq!(store.popular_hits("refund").unwrap(), Some(2));
    }

    #[test]
    fn test_record_usage_survives_store_failure() {
        let store = Arc::new(Store::open_memory().unwrap());
        let recorder = AnalyticsRecorder::new(store.clone());

        // Knock the usage table out from under the recorder
        store.query_readonly("DROP TABLE tool_usage", 1).unwrap();

        // Must not panic or propagate
        recorder.record_usage(&usage("database", 5));
    }

    #[test]
    fn test_session_fingerprint_shape() {
        let a = session_fingerprint("10.0.0.1", "curl/8.0");
        let b = session_fingerprint("10.0.0.1", "curl/8.0");
        let c = session_fingerprint("10.0.0.2", "curl/8.0");

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
