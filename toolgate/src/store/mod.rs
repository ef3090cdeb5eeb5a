//! SQLite-backed storage for searchable content, usage logs and analytics

mod schema;

pub use schema::SCHEMA_VERSION;

use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// A searchable content row
#[derive(Debug, Clone)]
pub struct ContentRow {
    pub id: i64,
    pub collection: String,
    pub name: String,
    pub path: String,
    pub body: String,
    pub keywords: String,
    pub tags: String,
    pub entities: String,
    pub category: String,
    pub file_type: String,
    pub quality_score: f64,
    pub business_value: f64,
    pub access_count: i64,
    pub updated_at: String,
}

/// Fields for inserting or updating a content row
#[derive(Debug, Clone, Copy)]
pub struct NewContent<'a> {
    pub collection: &'a str,
    pub name: &'a str,
    pub path: &'a str,
    pub body: &'a str,
    pub keywords: &'a str,
    pub tags: &'a str,
    pub entities: &'a str,
    pub category: &'a str,
    pub file_type: &'a str,
    pub quality_score: f64,
    pub business_value: f64,
}

/// Result of a read-only SQL query, capped at a row limit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub total_rows: usize,
    pub truncated: bool,
}

/// One tool invocation, as logged to the usage table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRow {
    pub trace_id: String,
    pub tool_name: String,
    pub category: String,
    pub success: bool,
    pub latency_ms: u64,
    pub result_count: Option<u32>,
    pub error: Option<String>,
    pub session: String,
}

/// One search invocation, as logged to the analytics table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRow {
    pub query: String,
    pub expanded_count: u32,
    pub result_count: u32,
    pub avg_relevance: f64,
    pub cache_hit: bool,
    pub latency_ms: u64,
    pub session: String,
}

/// SQLite store shared across request handlers
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Store {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Store> {
        let path = path.to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::ensure_schema(&conn)?;

        Ok(Store {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_memory() -> Result<Store> {
        let conn = Connection::open_in_memory()?;
        schema::ensure_schema(&conn)?;

        Ok(Store {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or update a content row, keeping the full-text index in sync
    pub fn upsert_content(&self, item: &NewContent<'_>) -> Result<i64> {
        let conn = self.lock();
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO content (collection, name, path, body, keywords, tags, entities,
                                  category, file_type, quality_score, business_value,
                                  access_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12)
             ON CONFLICT(collection, path) DO UPDATE SET
                 name = excluded.name,
                 body = excluded.body,
                 keywords = excluded.keywords,
                 tags = excluded.tags,
                 entities = excluded.entities,
                 category = excluded.category,
                 file_type = excluded.file_type,
                 quality_score = excluded.quality_score,
                 business_value = excluded.business_value,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                item.collection,
                item.name,
                item.path,
                item.body,
                item.keywords,
                item.tags,
                item.entities,
                item.category,
                item.file_type,
                item.quality_score,
                item.business_value,
                now,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM content WHERE collection = ?1 AND path = ?2",
            [item.collection, item.path],
            |row| row.get(0),
        )?;

        // FTS5 has no triggers here, so sync manually: delete then insert
        conn.execute("DELETE FROM content_fts WHERE rowid = ?1", [id])?;
        conn.execute(
            "INSERT INTO content_fts (rowid, name, path, body, keywords, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, item.name, item.path, item.body, item.keywords, item.tags],
        )?;

        Ok(id)
    }

    /// Retrieve candidate rows matching a full-text query or any of the terms.
    ///
    /// Candidates come from two directions: the FTS5 index (stemmed word
    /// matches over name, path, body, keywords and tags) and substring
    /// matches over the keyword, tag, entity and name columns. Optional
    /// collection, category and file-type filters narrow the pool.
    pub fn search_candidates(
        &self,
        fts_query: Option<&str>,
        terms: &[String],
        collection: Option<&str>,
        category: Option<&str>,
        file_type: Option<&str>,
        pool: usize,
    ) -> Result<Vec<ContentRow>> {
        let mut params: Vec<String> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        if let Some(fts) = fts_query.filter(|q| !q.is_empty()) {
            params.push(fts.to_string());
            clauses.push(format!(
                "id IN (SELECT rowid FROM content_fts WHERE content_fts MATCH ?{})",
                params.len()
            ));
        }

        for term in terms {
            params.push(format!("%{}%", term));
            let n = params.len();
            clauses.push(format!(
                "keywords LIKE ?{0} OR tags LIKE ?{0} OR entities LIKE ?{0} OR name LIKE ?{0}",
                n
            ));
        }

        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT id, collection, name, path, body, keywords, tags, entities,
                    category, file_type, quality_score, business_value, access_count, updated_at
             FROM content WHERE ({})",
            clauses.join(" OR ")
        );

        if let Some(collection) = collection {
            params.push(collection.to_string());
            sql.push_str(&format!(" AND collection = ?{}", params.len()));
        }
        if let Some(category) = category {
            params.push(category.to_string());
            sql.push_str(&format!(" AND category = ?{}", params.len()));
        }
        if let Some(file_type) = file_type {
            params.push(file_type.to_string());
            sql.push_str(&format!(" AND file_type = ?{}", params.len()));
        }

        sql.push_str(&format!(" ORDER BY id LIMIT {}", pool));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_content)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Count content rows, optionally within a collection
    pub fn content_count(&self, collection: Option<&str>) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = match collection {
            Some(collection) => conn.query_row(
                "SELECT COUNT(*) FROM content WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    /// Bump access counters for rows that were returned to a caller
    pub fn increment_access(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.lock();
        let mut stmt =
            conn.prepare("UPDATE content SET access_count = access_count + 1 WHERE id = ?1")?;
        for id in ids {
            stmt.execute([id])?;
        }
        Ok(())
    }

    /// Run a caller-supplied read-only statement, keeping at most `max_rows`
    /// rows while still counting the full result set
    pub fn query_readonly(&self, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        self.collect_query(sql, max_rows)
    }

    /// Run `EXPLAIN QUERY PLAN` for a statement
    pub fn explain(&self, sql: &str) -> Result<QueryOutput> {
        self.collect_query(&format!("EXPLAIN QUERY PLAN {}", sql), 256)
    }

    fn collect_query(&self, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query([])?;
        let mut collected: Vec<Value> = Vec::new();
        let mut total = 0usize;

        while let Some(row) = rows.next()? {
            total += 1;
            if collected.len() < max_rows {
                let mut object = serde_json::Map::new();
                for (i, name) in columns.iter().enumerate() {
                    object.insert(name.clone(), value_to_json(row.get_ref(i)?));
                }
                collected.push(Value::Object(object));
            }
        }

        Ok(QueryOutput {
            row_count: collected.len(),
            total_rows: total,
            truncated: total > collected.len(),
            columns,
            rows: collected,
        })
    }

    /// Row counts per table, for the stats tool
    pub fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        const TABLES: [&str; 5] = [
            "content",
            "tool_usage",
            "search_analytics",
            "category_usage",
            "popular_queries",
        ];

        let conn = self.lock();
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            counts.push((table.to_string(), count));
        }
        Ok(counts)
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.lock();
        let version: i64 = conn.query_row(
            "SELECT CAST(value AS INTEGER) FROM index_state WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Get database file size in bytes
    pub fn database_size(&self) -> Result<u64> {
        if self.path.to_str() == Some(":memory:") {
            return Ok(0);
        }
        Ok(std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0))
    }

    /// Append one row to the tool usage log
    pub fn insert_usage(&self, row: &UsageRow) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tool_usage (trace_id, tool_name, category, success, latency_ms,
                                     result_count, error, session, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                row.trace_id,
                row.tool_name,
                row.category,
                row.success,
                row.latency_ms as i64,
                row.result_count.map(|c| c as i64),
                row.error,
                row.session,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Usage rows for one tool, oldest first
    pub fn usage_for_tool(&self, tool_name: &str) -> Result<Vec<UsageRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT trace_id, tool_name, category, success, latency_ms, result_count, error, session
             FROM tool_usage WHERE tool_name = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([tool_name], |row| {
                Ok(UsageRow {
                    trace_id: row.get(0)?,
                    tool_name: row.get(1)?,
                    category: row.get(2)?,
                    success: row.get::<_, i64>(3)? != 0,
                    latency_ms: row.get::<_, i64>(4)? as u64,
                    result_count: row.get::<_, Option<i64>>(5)?.map(|c| c as u32),
                    error: row.get(6)?,
                    session: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Append one row to the search analytics log
    pub fn insert_search(&self, row: &SearchRow) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO search_analytics (query, expanded_count, result_count, avg_relevance,
                                           cache_hit, latency_ms, session, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                row.query,
                row.expanded_count as i64,
                row.result_count as i64,
                row.avg_relevance,
                row.cache_hit,
                row.latency_ms as i64,
                row.session,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Count logged searches for one query string
    pub fn search_count_for_query(&self, query: &str) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM search_analytics WHERE query = ?1",
            [query],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Read the rolling aggregate for a category, if one exists
    pub fn category_stats(&self, category: &str) -> Result<Option<(i64, f64)>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT call_count, avg_latency_ms FROM category_usage WHERE category = ?1",
            [category],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );
        match result {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write back the rolling aggregate for a category
    pub fn upsert_category(
        &self,
        category: &str,
        call_count: i64,
        avg_latency_ms: f64,
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO category_usage (category, call_count, avg_latency_ms, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(category) DO UPDATE SET
                 call_count = excluded.call_count,
                 avg_latency_ms = excluded.avg_latency_ms,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                category,
                call_count,
                avg_latency_ms,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Record one more hit for a query string
    pub fn bump_popular_query(&self, query: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO popular_queries (query, hits, last_used) VALUES (?1, 1, ?2)
             ON CONFLICT(query) DO UPDATE SET
                 hits = hits + 1,
                 last_used = excluded.last_used",
            rusqlite::params![query, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Hit count for one query string, if recorded
    pub fn popular_hits(&self, query: &str) -> Result<Option<i64>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT hits FROM popular_queries WHERE query = ?1",
            [query],
            |row| row.get(0),
        );
        match result {
            Ok(hits) => Ok(Some(hits)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

fn row_to_content(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContentRow> {
    Ok(ContentRow {
        id: row.get(0)?,
        collection: row.get(1)?,
        name: row.get(2)?,
        path: row.get(3)?,
        body: row.get(4)?,
        keywords: row.get(5)?,
        tags: row.get(6)?,
        entities: row.get(7)?,
        category: row.get(8)?,
        file_type: row.get(9)?,
        quality_score: row.get(10)?,
        business_value: row.get(11)?,
        access_count: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn value_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}
