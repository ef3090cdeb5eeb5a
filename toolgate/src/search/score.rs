//! Relevance scoring over retrieved candidates

use crate::search::preview;
use crate::store::ContentRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

pub const WEIGHT_TERM_FREQUENCY: f64 = 0.30;
pub const WEIGHT_KEYWORDS: f64 = 0.20;
pub const WEIGHT_TAGS: f64 = 0.15;
pub const WEIGHT_ENTITIES: f64 = 0.10;
pub const WEIGHT_PATH: f64 = 0.10;
pub const WEIGHT_QUALITY: f64 = 0.10;
pub const WEIGHT_POPULARITY: f64 = 0.05;

/// Saturation constant for the tf-idf sum; keeps the signal in 0..1
const TF_SATURATION: f64 = 4.0;

/// Saturation constant for access counts
const POPULARITY_SATURATION: f64 = 25.0;

/// One scored search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub collection: String,
    pub category: String,
    pub file_type: String,
    pub preview: String,
    pub relevance_score: f64,
    pub signals: SignalBreakdown,
}

/// Per-signal scores, kept on the hit so callers can see why it ranked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalBreakdown {
    pub term_frequency: f64,
    pub keywords: f64,
    pub tags: f64,
    pub entities: f64,
    pub path: f64,
    pub quality: f64,
    pub popularity: f64,
    pub file_type_multiplier: f64,
}

/// Score all candidates against the extracted terms, sorted best first
pub fn score_candidates(candidates: &[ContentRow], terms: &[String]) -> Vec<SearchHit> {
    let doc_freq = document_frequencies(candidates, terms);
    let pool = candidates.len();

    let mut hits: Vec<SearchHit> = candidates
        .iter()
        .map(|row| score_row(row, terms, &doc_freq, pool))
        .collect();

    hits.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });

    hits
}

fn score_row(
    row: &ContentRow,
    terms: &[String],
    doc_freq: &HashMap<String, usize>,
    pool: usize,
) -> SearchHit {
    let signals = SignalBreakdown {
        term_frequency: term_frequency_signal(&row.body, terms, doc_freq, pool),
        keywords: field_match_signal(&row.keywords, terms),
        tags: field_match_signal(&row.tags, terms),
        entities: field_match_signal(&row.entities, terms),
        path: path_signal(&row.path, &row.name, terms),
        quality: ((row.quality_score + row.business_value) / 2.0).clamp(0.0, 1.0),
        popularity: popularity_signal(row.access_count),
        file_type_multiplier: file_type_weight(&row.file_type),
    };

    let weighted = WEIGHT_TERM_FREQUENCY * signals.term_frequency
        + WEIGHT_KEYWORDS * signals.keywords
        + WEIGHT_TAGS * signals.tags
        + WEIGHT_ENTITIES * signals.entities
        + WEIGHT_PATH * signals.path
        + WEIGHT_QUALITY * signals.quality
        + WEIGHT_POPULARITY * signals.popularity;

    SearchHit {
        id: row.id,
        name: row.name.clone(),
        path: row.path.clone(),
        collection: row.collection.clone(),
        category: row.category.clone(),
        file_type: row.file_type.clone(),
        preview: preview::build_preview(&row.body, terms),
        relevance_score: weighted * signals.file_type_multiplier,
        signals,
    }
}

/// How many candidates contain each term anywhere in their searchable text
fn document_frequencies(candidates: &[ContentRow], terms: &[String]) -> HashMap<String, usize> {
    let texts: Vec<String> = candidates
        .iter()
        .map(|row| {
            format!(
                "{} {} {} {} {} {}",
                row.name, row.path, row.body, row.keywords, row.tags, row.entities
            )
            .to_lowercase()
        })
        .collect();

    let mut freq = HashMap::new();
    for term in terms {
        let df = texts.iter().filter(|text| text.contains(term.as_str())).count();
        freq.insert(term.clone(), df);
    }
    freq
}

/// Log-dampened term frequency with IDF weighting, saturated into 0..1.
///
/// More distinct matched terms always score higher, since every matched
/// term contributes a positive tf * idf increment.
fn term_frequency_signal(
    body: &str,
    terms: &[String],
    doc_freq: &HashMap<String, usize>,
    pool: usize,
) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let body_lower = body.to_lowercase();
    let mut sum = 0.0;

    for term in terms {
        let count = body_lower.matches(term.as_str()).count();
        if count == 0 {
            continue;
        }
        let tf = 1.0 + (count as f64).ln();
        let df = *doc_freq.get(term).unwrap_or(&1) as f64;
        sum += tf * bm25_idf(pool.max(1) as f64, df);
    }

    (sum / (sum + TF_SATURATION)).clamp(0.0, 1.0)
}

fn bm25_idf(total_docs: f64, df: f64) -> f64 {
    ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Fraction of terms found in a delimited metadata field
fn field_match_signal(field: &str, terms: &[String]) -> f64 {
    if terms.is_empty() || field.is_empty() {
        return 0.0;
    }
    let lower = field.to_lowercase();
    let matched = terms.iter().filter(|t| lower.contains(t.as_str())).count();
    matched as f64 / terms.len() as f64
}

/// Fraction of terms found in the path or the display name
fn path_signal(path: &str, name: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let haystack = format!("{} {}", path, name).to_lowercase();
    let matched = terms
        .iter()
        .filter(|t| haystack.contains(t.as_str()))
        .count();
    matched as f64 / terms.len() as f64
}

fn popularity_signal(access_count: i64) -> f64 {
    let count = access_count.max(0) as f64;
    count / (count + POPULARITY_SATURATION)
}

/// Per-file-type multiplier; code and structured content rank above prose
pub fn file_type_weight(file_type: &str) -> f64 {
    match file_type {
        "rs" | "py" | "php" | "js" | "ts" | "go" => 1.0,
        "sql" => 0.95,
        "md" => 0.9,
        "yml" | "yaml" | "json" | "toml" => 0.85,
        "html" => 0.8,
        "txt" => 0.75,
        "css" | "scss" => 0.7,
        _ => 0.8,
    }
}
