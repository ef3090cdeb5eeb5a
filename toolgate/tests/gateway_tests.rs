//! End-to-end gateway tests
//!
//! These exercise the full dispatch path through the public API: JSON-RPC
//! parsing, auth, schema validation, the sandbox guards, search with its
//! result cache, and the usage/search analytics that every call leaves
//! behind.

use serde_json::{json, Value};
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use toolgate::config::{Config, GithubConfig, SshConfig};
use toolgate::store::NewContent;
use toolgate::{
    build_registry, AnalyticsRecorder, Caller, Dispatcher, SearchEngine, Store, TieredCache,
    ToolExecutor,
};

struct Gateway {
    dispatcher: Dispatcher,
    store: Arc<Store>,
    dir: tempfile::TempDir,
}

fn test_config(dir: &tempfile::TempDir) -> Config {
    Config {
        bind: "127.0.0.1:0".to_string(),
        db_path: ":memory:".into(),
        cache_dir: dir.path().join("cache"),
        cache_ttl_secs: 60,
        fs_root: dir.path().join("jail"),
        fs_max_write_bytes: 200_000,
        ssh: SshConfig {
            enabled: true,
            allowed_commands: vec!["echo allow-listed".to_string()],
            host: None,
            user: None,
            key_path: None,
        },
        sql_readonly_enabled: true,
        log_files: vec![dir.path().join("app.log")],
        api_key: None,
        search_min_relevance: 0.01,
        http_timeout_secs: 5,
        github: GithubConfig {
            api_base: "https://api.github.com".to_string(),
            token: None,
        },
    }
}

fn gateway() -> Gateway {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.fs_root).unwrap();

    let mut log = File::create(dir.path().join("app.log")).unwrap();
    for line in 1..=20 {
        writeln!(log, "log line {}", line).unwrap();
    }

    let store = Arc::new(Store::open_memory().unwrap());
    store
        .upsert_content(&NewContent {
            collection: "default",
            name: "refund-runbook",
            path: "support/refund-runbook.md",
            body: "Step by step guide for processing a refund in the billing portal.",
            keywords: "refund,billing",
            tags: "support",
            entities: "",
            category: "support",
            file_type: "md",
            quality_score: 0.8,
            business_value: 0.7,
        })
        .unwrap();
    store
        .upsert_content(&NewContent {
            collection: "default",
            name: "reimbursement-policy",
            path: "policies/reimbursement.md",
            body: "Reimbursement policy for employee expense claims.",
            keywords: "reimbursement policy",
            tags: "policy",
            entities: "",
            category: "policies",
            file_type: "md",
            quality_score: 0.9,
            business_value: 0.9,
        })
        .unwrap();

    let cache = TieredCache::new(config.cache_dir.clone(), Duration::from_secs(60));
    let search = SearchEngine::new(store.clone(), cache, config.search_min_relevance);
    let executor = ToolExecutor::new(&config, store.clone(), search).unwrap();
    let registry = build_registry(&config).unwrap();
    let recorder = AnalyticsRecorder::new(store.clone());

    Gateway {
        dispatcher: Dispatcher::new(registry, executor, recorder, None),
        store,
        dir,
    }
}

async fn rpc(gateway: &Gateway, method: &str, params: Value) -> Value {
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string();
    let caller = Caller::new("10.0.0.1", "gateway-tests/1.0");
    let dispatch = gateway.dispatcher.handle(&body, None, &caller).await;
    assert_eq!(dispatch.http_status, 200);
    let response = dispatch.response;
    assert!(response.error.is_none(), "unexpected protocol error");
    response.result.unwrap()
}

async fn call(gateway: &Gateway, tool: &str, arguments: Value) -> Value {
    rpc(
        gateway,
        "tools/call",
        json!({"name": tool, "arguments": arguments}),
    )
    .await
}

#[tokio::test]
async fn test_catalog_integrity() {
    let gateway = gateway();
    let result = rpc(&gateway, "tools/list", json!({})).await;

    let tools = result["tools"].as_array().unwrap();
    assert!(tools.len() >= 13);

    for tool in tools {
        assert!(!tool["name"].as_str().unwrap().is_empty());
        assert!(!tool["description"].as_str().unwrap().is_empty());

        let schema = &tool["parameterSchema"];
        let properties = schema["properties"].as_object().unwrap();
        for required in schema["required"].as_array().unwrap() {
            assert!(
                properties.contains_key(required.as_str().unwrap()),
                "{}: required field not declared",
                tool["name"]
            );
        }
        assert!(tool["safetyPolicy"]["timeoutSeconds"].as_u64().unwrap() > 0);
        assert!(tool["safetyPolicy"]["rateLimitPerMinute"].as_u64().unwrap() > 0);
    }
}

#[tokio::test]
async fn test_fs_write_then_read_round_trip() {
    let gateway = gateway();

    let written = call(
        &gateway,
        "fs.write",
        json!({"path": "notes/todo.txt", "content": "ship the gateway"}),
    )
    .await;
    assert_eq!(written["status"], 200);

    let read = call(&gateway, "fs.read", json!({"path": "notes/todo.txt"})).await;
    assert_eq!(read["status"], 200);
    assert_eq!(read["data"]["content"], "ship the gateway");
}

#[tokio::test]
async fn test_traversal_paths_never_escape() {
    let gateway = gateway();

    for path in [
        "../outside.txt",
        "../../etc/passwd",
        "a/../../../b",
        "/etc/passwd",
    ] {
        let result = call(&gateway, "fs.read", json!({"path": path})).await;
        assert!(
            result["status"] == 403 || result["status"] == 404,
            "path {:?} produced status {}",
            path,
            result["status"]
        );
    }
    assert!(!gateway.dir.path().join("outside.txt").exists());
}

#[tokio::test]
async fn test_command_rejection_echoes_allow_list() {
    let gateway = gateway();

    // Close misses of the allow-listed entry all fail exact matching
    for command in ["echo allow-listed && ls", "echo", "rm -rf /"] {
        let result = call(&gateway, "ssh.exec_allowlist", json!({"command": command})).await;
        assert_eq!(result["status"], 403);
        assert_eq!(result["data"]["allowedCommands"][0], "echo allow-listed");
    }

    let result = call(
        &gateway,
        "ssh.exec_allowlist",
        json!({"command": "echo allow-listed"}),
    )
    .await;
    assert_eq!(result["status"], 200);
    assert_eq!(result["data"]["exitCode"], 0);
    assert!(result["data"]["stdout"].as_str().unwrap().contains("allow-listed"));
}

#[tokio::test]
async fn test_write_verbs_rejected_before_the_connection() {
    let gateway = gateway();

    for sql in [
        "DELETE FROM content",
        "DROP TABLE tool_usage",
        "UPDATE content SET name = 'x'",
        "WITH x AS (SELECT 1) INSERT INTO content SELECT * FROM x",
    ] {
        let result = call(&gateway, "db.query_readonly", json!({"sql": sql})).await;
        assert_eq!(result["status"], 403, "verb slipped through: {}", sql);
    }

    // The content table is untouched
    let result = call(
        &gateway,
        "db.query_readonly",
        json!({"sql": "SELECT count(*) AS n FROM content"}),
    )
    .await;
    assert_eq!(result["status"], 200);
    assert_eq!(result["data"]["rows"][0]["n"], 2);
}

#[tokio::test]
async fn test_database_failure_is_an_upstream_error() {
    let gateway = gateway();

    let result = call(
        &gateway,
        "db.query_readonly",
        json!({"sql": "SELECT * FROM no_such_table"}),
    )
    .await;

    assert_eq!(result["status"], 502);
    assert!(result["data"]["error"].as_str().unwrap().contains("no_such_table"));
}

#[tokio::test]
async fn test_repeat_search_is_a_cache_hit_with_identical_results() {
    let gateway = gateway();
    let args = json!({"query": "refund", "limit": 10});

    let first = call(&gateway, "knowledge.search", args.clone()).await;
    let second = call(&gateway, "knowledge.search", args).await;

    assert_eq!(first["data"]["cacheHit"], false);
    assert_eq!(second["data"]["cacheHit"], true);
    assert_eq!(first["data"]["results"], second["data"]["results"]);
}

#[tokio::test]
async fn test_synonym_expansion_reaches_related_content() {
    let gateway = gateway();
    let result = call(&gateway, "knowledge.search", json!({"query": "refund"})).await;

    let expanded = result["data"]["expandedQueries"].as_array().unwrap();
    assert_eq!(expanded.len(), 4);
    assert_eq!(expanded[0], "refund");

    // The reimbursement doc never mentions "refund"; only expansion finds it
    let hits = result["data"]["results"].as_array().unwrap();
    let policy = hits
        .iter()
        .find(|hit| hit["path"] == "policies/reimbursement.md")
        .expect("expansion should surface the reimbursement policy");
    assert!(policy["signals"]["keywords"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_every_call_leaves_one_usage_row() {
    let gateway = gateway();

    call(&gateway, "db.stats", json!({})).await;
    call(&gateway, "no.such_tool", json!({})).await;
    call(&gateway, "knowledge.search", json!({})).await; // fails validation

    assert_eq!(gateway.store.usage_for_tool("db.stats").unwrap().len(), 1);

    let unknown = gateway.store.usage_for_tool("no.such_tool").unwrap();
    assert_eq!(unknown.len(), 1);
    assert!(!unknown[0].success);

    let invalid = gateway.store.usage_for_tool("knowledge.search").unwrap();
    assert_eq!(invalid.len(), 1);
    assert!(!invalid[0].success);
}

#[tokio::test]
async fn test_logs_tail_returns_trailing_lines() {
    let gateway = gateway();
    let file = gateway.dir.path().join("app.log").display().to_string();

    let result = call(&gateway, "logs.tail", json!({"file": file, "lines": 5})).await;
    assert_eq!(result["status"], 200);

    let lines = result["data"]["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines.last().unwrap(), "log line 20");
}

#[tokio::test]
async fn test_system_health_snapshot() {
    let gateway = gateway();
    let result = call(&gateway, "system.health", json!({})).await;

    assert_eq!(result["status"], 200);
    assert_eq!(result["data"]["status"], "ok");
    assert!(!result["data"]["version"].as_str().unwrap().is_empty());
}
