//! Database tools: read-only queries, plans and stats

use super::{optional_u64, require_str};
use crate::error::Result;
use crate::sandbox::StatementPolicy;
use crate::store::Store;
use serde_json::{json, Value};

const DEFAULT_MAX_ROWS: u64 = 100;

pub(super) fn query_readonly(
    store: &Store,
    statements: &StatementPolicy,
    args: &Value,
) -> Result<Value> {
    let sql = require_str(args, "sql")?;
    statements.check(sql)?;

    let max_rows = optional_u64(args, "maxRows").unwrap_or(DEFAULT_MAX_ROWS) as usize;
    let output = store.query_readonly(sql, max_rows)?;

    Ok(serde_json::to_value(output)?)
}

pub(super) fn explain(store: &Store, statements: &StatementPolicy, args: &Value) -> Result<Value> {
    let sql = require_str(args, "sql")?;
    statements.check(sql)?;

    let plan = store.explain(sql)?;

    Ok(json!({
        "sql": sql,
        "plan": plan.rows,
    }))
}

pub(super) fn stats(store: &Store) -> Result<Value> {
    let tables: Vec<Value> = store
        .table_counts()?
        .into_iter()
        .map(|(name, rows)| json!({"name": name, "rows": rows}))
        .collect();

    Ok(json!({
        "tables": tables,
        "schemaVersion": store.schema_version()?,
        "databaseSizeBytes": store.database_size()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewContent;

    fn seeded_store() -> Store {
        let store = Store::open_memory().unwrap();
        for i in 0..5 {
            store
                .upsert_content(&NewContent {
                    collection: "default",
                    name: "doc",
                    path: Box::leak(format!("docs/{}.md", i).into_boxed_str()),
                    body: "body",
                    keywords: "",
                    tags: "",
                    entities: "",
                    category: "docs",
                    file_type: "md",
                    quality_score: 0.5,
                    business_value: 0.5,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_query_readonly_select() {
        let store = seeded_store();
        let policy = StatementPolicy::new(true);

        let output = query_readonly(
            &store,
            &policy,
            &json!({"sql": "SELECT path FROM content ORDER BY id", "maxRows": 2}),
        )
        .unwrap();

        assert_eq!(output["rowCount"], 2);
        assert_eq!(output["totalRows"], 5);
        assert_eq!(output["truncated"], true);
        assert_eq!(output["rows"][0]["path"], "docs/0.md");
    }

    #[test]
    fn test_query_readonly_rejects_writes() {
        let store = seeded_store();
        let policy = StatementPolicy::new(true);

        let err = query_readonly(
            &store,
            &policy,
            &json!({"sql": "DELETE FROM content"}),
        )
        .unwrap_err();

        assert_eq!(err.status(), 403);
        // Nothing was deleted
        assert_eq!(store.content_count(None).unwrap(), 5);
    }

    #[test]
    fn test_query_readonly_disabled() {
        let store = seeded_store();
        let policy = StatementPolicy::new(false);

        let err = query_readonly(&store, &policy, &json!({"sql": "SELECT 1"})).unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_explain_returns_plan() {
        let store = seeded_store();
        let policy = StatementPolicy::new(true);

        let output = explain(
            &store,
            &policy,
            &json!({"sql": "SELECT * FROM content WHERE id = 3"}),
        )
        .unwrap();

        assert!(!output["plan"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_stats_shape() {
        let store = seeded_store();

        let output = stats(&store).unwrap();

        let tables = output["tables"].as_array().unwrap();
        let content = tables
            .iter()
            .find(|t| t["name"] == "content")
            .unwrap();
        assert_eq!(content["rows"], 5);
        assert_eq!(output["schemaVersion"], crate::store::SCHEMA_VERSION);
    }
}
