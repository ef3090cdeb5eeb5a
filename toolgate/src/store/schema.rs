//! Database schema for the gateway store

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i64 = 1;

/// SQL to create the database schema
const SCHEMA_SQL: &str = r#"
-- Searchable content rows, populated by external ingestion
CREATE TABLE IF NOT EXISTS content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL DEFAULT 'default',
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    body TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '',
    entities TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    file_type TEXT NOT NULL DEFAULT '',
    quality_score REAL NOT NULL DEFAULT 0.5,
    business_value REAL NOT NULL DEFAULT 0.5,
    access_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE(collection, path)
);

CREATE INDEX IF NOT EXISTS idx_content_collection ON content(collection);
CREATE INDEX IF NOT EXISTS idx_content_category ON content(category);
CREATE INDEX IF NOT EXISTS idx_content_file_type ON content(file_type);

-- Full-text index using FTS5 with Porter stemmer; entities are matched by
-- substring only, so they stay out of the index
CREATE VIRTUAL TABLE IF NOT EXISTS content_fts USING fts5(
    name,
    path,
    body,
    keywords,
    tags,
    tokenize='porter unicode61'
);

-- Tool usage log, one row per tools/call
CREATE TABLE IF NOT EXISTS tool_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    category TEXT NOT NULL,
    success INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL,
    result_count INTEGER,
    error TEXT,
    session TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tool_usage_tool ON tool_usage(tool_name);

-- Search analytics, one row per search-tool call
CREATE TABLE IF NOT EXISTS search_analytics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    expanded_count INTEGER NOT NULL,
    result_count INTEGER NOT NULL,
    avg_relevance REAL NOT NULL,
    cache_hit INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL,
    session TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Rolling per-category usage aggregates, updated best-effort
CREATE TABLE IF NOT EXISTS category_usage (
    category TEXT PRIMARY KEY,
    call_count INTEGER NOT NULL,
    avg_latency_ms REAL NOT NULL,
    updated_at TEXT NOT NULL
);

-- Popular query counters
CREATE TABLE IF NOT EXISTS popular_queries (
    query TEXT PRIMARY KEY,
    hits INTEGER NOT NULL,
    last_used TEXT NOT NULL
);

-- Gateway state (schema version, bookkeeping)
CREATE TABLE IF NOT EXISTS index_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Note: FTS5 doesn't support traditional triggers, so we sync manually
-- in the application code using DELETE + INSERT pattern.
"#;

/// Ensure the database schema is up to date
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    // Check if schema exists
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='index_state'",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        // Create initial schema
        conn.execute_batch(SCHEMA_SQL)?;

        // Set schema version
        conn.execute(
            "INSERT INTO index_state (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION.to_string()],
        )?;

        tracing::info!("Created database schema version {}", SCHEMA_VERSION);
    } else {
        // Check schema version
        let version: i64 = conn
            .query_row(
                "SELECT CAST(value AS INTEGER) FROM index_state WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            migrate(conn, version)?;
        }
    }

    Ok(())
}

/// Migrate from an older schema version
fn migrate(conn: &Connection, from_version: i64) -> Result<()> {
    tracing::info!(
        "Migrating database from version {} to {}",
        from_version,
        SCHEMA_VERSION
    );

    // Add migration steps here as schema evolves
    // For now, we only have version 1

    // Update schema version
    conn.execute(
        "UPDATE index_state SET value = ?1 WHERE key = 'schema_version'",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
