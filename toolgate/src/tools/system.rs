//! Gateway health snapshot

use crate::error::Result;
use crate::search::SearchEngine;
use crate::store::Store;
use serde_json::{json, Value};
use std::time::Instant;

pub(super) fn health(store: &Store, search: &SearchEngine, started: Instant) -> Result<Value> {
    let (memory_entries, file_entries) = search.cache_entry_counts();

    Ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": started.elapsed().as_secs(),
        "databaseSizeBytes": store.database_size()?,
        "contentRows": store.content_count(None)?,
        "cache": {
            "memoryEntries": memory_entries,
            "fileEntries": file_entries,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TieredCache;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_health_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_memory().unwrap());
        let cache = TieredCache::new(dir.path().join("cache"), Duration::from_secs(60));
        let search = SearchEngine::new(store.clone(), cache, 0.05);

        let output = health(&store, &search, Instant::now()).unwrap();

        assert_eq!(output["status"], "ok");
        assert_eq!(output["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(output["contentRows"], 0);
        assert_eq!(output["cache"]["memoryEntries"], 0);
    }
}
