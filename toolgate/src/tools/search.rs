//! Search tools over the indexed content

use super::{optional_str, optional_u64, require_str};
use crate::error::Result;
use crate::search::{SearchEngine, SearchFilters, DEFAULT_LIMIT};
use serde_json::Value;

pub(super) fn knowledge_search(engine: &SearchEngine, args: &Value) -> Result<Value> {
    let query = require_str(args, "query")?;
    let filters = SearchFilters {
        collection: optional_str(args, "collection").map(String::from),
        category: optional_str(args, "category").map(String::from),
        file_type: optional_str(args, "fileType").map(String::from),
    };
    let limit = optional_u64(args, "limit").unwrap_or(DEFAULT_LIMIT as u64) as usize;

    let response = engine.search(query, &filters, limit)?;
    Ok(serde_json::to_value(response)?)
}

pub(super) fn find_code(engine: &SearchEngine, args: &Value) -> Result<Value> {
    let query = require_str(args, "query")?;
    let filters = SearchFilters {
        collection: None,
        category: None,
        file_type: optional_str(args, "language").map(String::from),
    };
    let limit = optional_u64(args, "limit").unwrap_or(DEFAULT_LIMIT as u64) as usize;

    let response = engine.search(query, &filters, limit)?;
    Ok(serde_json::to_value(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TieredCache;
    use crate::store::{NewContent, Store};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> (SearchEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_memory().unwrap());

        store
            .upsert_content(&NewContent {
                collection: "default",
                name: "refund-handler",
                path: "src/billing/refund.rs",
                body: "fn issue_refund(order: &Order) -> Result<Receipt> { /* refund flow */ }",
                keywords: "refund,billing",
                tags: "code",
                entities: "",
                category: "code",
                file_type: "rs",
                quality_score: 0.8,
                business_value: 0.6,
            })
            .unwrap();
        store
            .upsert_content(&NewContent {
                collection: "default",
                name: "refund-doc",
                path: "docs/refund.md",
                body: "Refund procedure documentation.",
                keywords: "refund",
                tags: "docs",
                entities: "",
                category: "docs",
                file_type: "md",
                quality_score: 0.7,
                business_value: 0.7,
            })
            .unwrap();

        let cache = TieredCache::new(dir.path().join("cache"), Duration::from_secs(60));
        (SearchEngine::new(store, cache, 0.01), dir)
    }

    #[test]
    fn test_knowledge_search_payload() {
        let (engine, _dir) = engine();

        let output = knowledge_search(&engine, &json!({"query": "refund"})).unwrap();

        assert_eq!(output["cacheHit"], false);
        assert_eq!(output["expandedQueries"].as_array().unwrap().len(), 4);
        assert!(output["results"].as_array().unwrap().len() >= 2);
        assert!(output["results"][0]["relevanceScore"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_find_code_restricts_language() {
        let (engine, _dir) = engine();

        let output = find_code(&engine, &json!({"query": "refund", "language": "rs"})).unwrap();

        let results = output["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["fileType"], "rs");
    }
}
