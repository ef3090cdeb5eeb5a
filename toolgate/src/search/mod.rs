//! Knowledge search: expansion, retrieval, scoring and caching

mod expand;
mod preview;
mod score;

pub use expand::{QueryExpander, MAX_VARIANTS};
pub use score::{SearchHit, SignalBreakdown};

use crate::cache::TieredCache;
use crate::error::Result;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of results returned when the caller does not ask
pub const DEFAULT_LIMIT: usize = 10;

/// Hard ceiling on the number of results per search
pub const MAX_LIMIT: usize = 50;

/// Candidates retrieved per requested result, before scoring
const POOL_FACTOR: usize = 5;

const STOPWORDS: [&str; 26] = [
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "has", "have",
    "had", "not", "but", "all", "can", "how", "what", "when", "where", "who", "why", "you",
    "your", "about",
];

/// Optional filters narrowing a search
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub collection: Option<String>,
    pub category: Option<String>,
    pub file_type: Option<String>,
}

/// A full search response, which is also the cached payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub expanded_queries: Vec<String>,
    pub cache_hit: bool,
    pub total_candidates: usize,
}

/// Search engine over the content store with a two-tier result cache
pub struct SearchEngine {
    store: Arc<Store>,
    cache: TieredCache,
    expander: QueryExpander,
    min_relevance: f64,
}

impl SearchEngine {
    pub fn new(store: Arc<Store>, cache: TieredCache, min_relevance: f64) -> Self {
        Self {
            store,
            cache,
            expander: QueryExpander::new(),
            min_relevance,
        }
    }

    /// Run a search: expand the query, retrieve candidates, score them and
    /// return the top results.
    ///
    /// Cache reads happen before any retrieval; cache write failures are
    /// logged and never fail the search itself.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<SearchResponse> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let key = cache_key(query, filters, limit);

        if let Some(payload) = self.cache.get(&key) {
            match serde_json::from_value::<SearchResponse>(payload) {
                Ok(mut response) => {
                    response.cache_hit = true;
                    return Ok(response);
                }
                Err(err) => {
                    tracing::warn!("Discarding unreadable cached search payload: {}", err);
                }
            }
        }

        let expanded = self.expander.expand(query);
        let terms = extract_terms(&expanded);
        let fts_query = build_fts_query(&terms);

        let candidates = self.store.search_candidates(
            fts_query.as_deref(),
            &terms,
            filters.collection.as_deref(),
            filters.category.as_deref(),
            filters.file_type.as_deref(),
            limit * POOL_FACTOR,
        )?;
        let total_candidates = candidates.len();

        let mut hits = score::score_candidates(&candidates, &terms);
        hits.retain(|hit| hit.relevance_score >= self.min_relevance);
        hits.truncate(limit);

        let returned_ids: Vec<i64> = hits.iter().map(|hit| hit.id).collect();
        if let Err(err) = self.store.increment_access(&returned_ids) {
            tracing::warn!("Failed to update access counters: {}", err);
        }

        let response = SearchResponse {
            results: hits,
            expanded_queries: expanded,
            cache_hit: false,
            total_candidates,
        };

        match serde_json::to_value(&response) {
            Ok(payload) => self.cache.put(&key, &payload),
            Err(err) => tracing::warn!("Failed to serialize search payload for cache: {}", err),
        }

        Ok(response)
    }

    /// Entry counts per cache tier (memory, file)
    pub fn cache_entry_counts(&self) -> (usize, usize) {
        self.cache.entry_counts()
    }
}

/// Extract searchable terms from the expanded variants: lowercased,
/// punctuation split, at least three characters, stopwords dropped,
/// first occurrence order preserved
pub fn extract_terms(variants: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for variant in variants {
        for raw in variant.split(|c: char| !c.is_alphanumeric()) {
            let term = raw.to_lowercase();
            if term.chars().count() < 3 {
                continue;
            }
            if STOPWORDS.contains(&term.as_str()) {
                continue;
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

fn build_fts_query(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" OR "))
}

fn cache_key(query: &str, filters: &SearchFilters, limit: usize) -> String {
    let material = format!(
        "q={}|collection={}|category={}|fileType={}|limit={}",
        query,
        filters.collection.as_deref().unwrap_or(""),
        filters.category.as_deref().unwrap_or(""),
        filters.file_type.as_deref().unwrap_or(""),
        limit,
    );
    crate::sha256_hex(material.as_bytes())
}
