//! Request dispatch: parse, authenticate, route, envelope, record

use super::protocol::{
    new_trace_id, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    ToolCallResult, PROTOCOL_VERSION,
};
use crate::analytics::{session_fingerprint, AnalyticsRecorder};
use crate::error::Error;
use crate::registry::{ToolKind, ToolRegistry, ToolSpec};
use crate::store::{SearchRow, UsageRow};
use crate::tools::ToolExecutor;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Transport-level identity of the caller, used for session fingerprints
#[derive(Debug, Clone)]
pub struct Caller {
    pub client_ip: String,
    pub user_agent: String,
}

impl Caller {
    pub fn new(client_ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// A finished dispatch: the HTTP status to answer with and the JSON-RPC body
#[derive(Debug)]
pub struct Dispatch {
    pub http_status: u16,
    pub response: JsonRpcResponse,
}

/// Routes JSON-RPC requests to the tool registry.
///
/// Owns the registry, the executor holding the sandboxed resources, and the
/// analytics recorder. One dispatcher serves the whole process; requests are
/// handled independently.
pub struct Dispatcher {
    registry: ToolRegistry,
    executor: ToolExecutor,
    recorder: AnalyticsRecorder,
    api_key: Option<String>,
}

impl Dispatcher {
    pub fn new(
        registry: ToolRegistry,
        executor: ToolExecutor,
        recorder: AnalyticsRecorder,
        api_key: Option<String>,
    ) -> Self {
        Self {
            registry,
            executor,
            recorder,
            api_key,
        }
    }

    /// Handle one raw request body.
    ///
    /// Auth runs before any parsing or tool logic; parse and envelope errors
    /// ride HTTP 200 as JSON-RPC error bodies, auth failures answer 401.
    pub async fn handle(
        &self,
        body: &str,
        authorization: Option<&str>,
        caller: &Caller,
    ) -> Dispatch {
        if let Some(expected) = &self.api_key {
            let presented = authorization.and_then(|h| h.strip_prefix("Bearer "));
            if !presented.is_some_and(|key| constant_time_eq(key, expected)) {
                return Dispatch {
                    http_status: 401,
                    response: JsonRpcResponse::error(None, JsonRpcError::unauthorized()),
                };
            }
        }

        let request = match serde_json::from_str::<JsonRpcRequest>(body) {
            Ok(request) => request,
            Err(err) => {
                return Dispatch {
                    http_status: 200,
                    response: JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Parse error: {}", err)),
                    ),
                };
            }
        };

        Dispatch {
            http_status: 200,
            response: self.handle_request(request, caller).await,
        }
    }

    /// Handle a parsed JSON-RPC request
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        caller: &Caller,
    ) -> JsonRpcResponse {
        if request.jsonrpc != "2.0" || request.method.is_empty() {
            return JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("Expected a JSON-RPC 2.0 request with a method"),
            );
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "notifications/initialized" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params, caller).await,
            "ping" => Ok(json!({})),
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        }
    }

    fn handle_initialize(&self) -> std::result::Result<Value, JsonRpcError> {
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        }))
    }

    fn handle_tools_list(&self) -> std::result::Result<Value, JsonRpcError> {
        Ok(json!({ "tools": self.registry.catalog() }))
    }

    /// Run one tool call and wrap the outcome in the result envelope.
    ///
    /// Tool-level failures (unknown tool, validation, sandbox, upstream,
    /// timeout) are envelopes, not protocol errors, so every call produces
    /// exactly one usage record. Only a missing/shapeless `params` object is
    /// a protocol error.
    async fn handle_tools_call(
        &self,
        params: &Option<Value>,
        caller: &Caller,
    ) -> std::result::Result<Value, JsonRpcError> {
        let params = params
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
        let tool_name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let trace_id = new_trace_id();
        let session = session_fingerprint(&caller.client_ip, &caller.user_agent);
        let started = Instant::now();

        let spec = match self.registry.get(tool_name) {
            Some(spec) => spec,
            None => {
                let err = Error::UnknownTool(tool_name.to_string());
                let envelope = ToolCallResult::from_error(&err, &trace_id);
                self.record_usage(tool_name, "unknown", &envelope, started, &session, None);
                return envelope_value(envelope);
            }
        };

        if let Err(err) = spec.params.validate(&arguments) {
            let envelope = ToolCallResult::from_error(&err, &trace_id);
            self.record_usage(tool_name, &spec.category, &envelope, started, &session, None);
            return envelope_value(envelope);
        }

        let deadline = Duration::from_secs(spec.policy.timeout_seconds);
        let outcome = match tokio::time::timeout(deadline, self.executor.execute(spec, &arguments))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(spec.policy.timeout_seconds)),
        };

        let envelope = match outcome {
            Ok(data) => ToolCallResult::ok(data, &trace_id),
            Err(err) => {
                tracing::warn!(
                    tool = %spec.name,
                    trace_id = %trace_id,
                    status = err.status(),
                    "tool call failed: {}",
                    err
                );
                ToolCallResult::from_error(&err, &trace_id)
            }
        };

        let result_count = count_results(&envelope.data);
        self.record_usage(
            tool_name,
            &spec.category,
            &envelope,
            started,
            &session,
            result_count,
        );
        if is_search_tool(spec) {
            self.record_search(&arguments, &envelope.data, started, &session);
        }

        tracing::info!(
            tool = %spec.name,
            trace_id = %envelope.trace_id,
            status = envelope.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call completed"
        );

        envelope_value(envelope)
    }

    fn record_usage(
        &self,
        tool_name: &str,
        category: &str,
        envelope: &ToolCallResult,
        started: Instant,
        session: &str,
        result_count: Option<u32>,
    ) {
        let error = if envelope.is_success() {
            None
        } else {
            envelope
                .data
                .get("error")
                .and_then(|v| v.as_str())
                .map(String::from)
        };
        self.recorder.record_usage(&UsageRow {
            trace_id: envelope.trace_id.clone(),
            tool_name: tool_name.to_string(),
            category: category.to_string(),
            success: envelope.is_success(),
            latency_ms: started.elapsed().as_millis() as u64,
            result_count,
            error,
            session: session.to_string(),
        });
    }

    fn record_search(&self, arguments: &Value, data: &Value, started: Instant, session: &str) {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let results = data
            .get("results")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let avg_relevance = if results.is_empty() {
            0.0
        } else {
            results
                .iter()
                .filter_map(|hit| hit.get("relevanceScore").and_then(|v| v.as_f64()))
                .sum::<f64>()
                / results.len() as f64
        };

        self.recorder.record_search(&SearchRow {
            query: query.to_string(),
            expanded_count: data
                .get("expandedQueries")
                .and_then(|v| v.as_array())
                .map(|a| a.len() as u32)
                .unwrap_or(0),
            result_count: results.len() as u32,
            avg_relevance,
            cache_hit: data
                .get("cacheHit")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            latency_ms: started.elapsed().as_millis() as u64,
            session: session.to_string(),
        });
    }
}

fn is_search_tool(spec: &ToolSpec) -> bool {
    matches!(spec.kind, ToolKind::KnowledgeSearch | ToolKind::FindCode)
}

fn envelope_value(envelope: ToolCallResult) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(envelope).map_err(|e| JsonRpcError::server_error(e.to_string()))
}

/// Number of items in the payload's main collection, when there is one
fn count_results(data: &Value) -> Option<u32> {
    for field in ["results", "rows", "entries", "issues"] {
        if let Some(items) = data.get(field).and_then(|v| v.as_array()) {
            return Some(items.len() as u32);
        }
    }
    None
}

/// Compare two strings without short-circuiting on the first mismatch
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsRecorder;
    use crate::cache::TieredCache;
    use crate::config::{Config, GithubConfig, SshConfig};
    use crate::registry::build_registry;
    use crate::search::SearchEngine;
    use crate::store::{NewContent, Store};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        dispatcher: Dispatcher,
        store: Arc<Store>,
        _dir: tempfile::TempDir,
    }

    fn fixture(api_key: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            bind: "127.0.0.1:0".to_string(),
            db_path: ":memory:".into(),
            cache_dir: dir.path().join("cache"),
            cache_ttl_secs: 60,
            fs_root: dir.path().join("jail"),
            fs_max_write_bytes: 200_000,
            ssh: SshConfig {
                enabled: false,
                allowed_commands: Vec::new(),
                host: None,
                user: None,
                key_path: None,
            },
            sql_readonly_enabled: true,
            log_files: Vec::new(),
            api_key: api_key.map(String::from),
            search_min_relevance: 0.01,
            http_timeout_secs: 5,
            github: GithubConfig {
                api_base: "https://api.github.com".to_string(),
                token: None,
            },
        };
        std::fs::create_dir_all(&config.fs_root).unwrap();

        let store = Arc::new(Store::open_memory().unwrap());
        store
            .upsert_content(&NewContent {
                collection: "default",
                name: "refund-runbook",
                path: "support/refund-runbook.md",
                body: "How to process a refund through the billing portal.",
                keywords: "refund,billing",
                tags: "support",
                entities: "",
                category: "support",
                file_type: "md",
                quality_score: 0.8,
                business_value: 0.7,
            })
            .unwrap();

        let cache = TieredCache::new(config.cache_dir.clone(), Duration::from_secs(60));
        let search = SearchEngine::new(store.clone(), cache, config.search_min_relevance);
        let executor = ToolExecutor::new(&config, store.clone(), search).unwrap();
        let registry = build_registry(&config).unwrap();
        let recorder = AnalyticsRecorder::new(store.clone());

        Fixture {
            dispatcher: Dispatcher::new(registry, executor, recorder, config.api_key.clone()),
            store,
            _dir: dir,
        }
    }

    fn caller() -> Caller {
        Caller::new("10.0.0.1", "test/1.0")
    }

    async fn call_tool(fixture: &Fixture, name: &str, arguments: Value) -> Value {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        })
        .to_string();
        let dispatch = fixture.dispatcher.handle(&body, None, &caller()).await;
        assert_eq!(dispatch.http_status, 200);
        dispatch.response.result.unwrap()
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secres"));
        assert!(!constant_time_eq("secret", "secret-longer"));
        assert!(constant_time_eq("", ""));
    }

    #[tokio::test]
    async fn test_auth_rejects_missing_and_wrong_key() {
        let fixture = fixture(Some("hunter2"));

        let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let missing = fixture.dispatcher.handle(body, None, &caller()).await;
        assert_eq!(missing.http_status, 401);
        assert_eq!(missing.response.error.unwrap().code, -32001);

        let wrong = fixture
            .dispatcher
            .handle(body, Some("Bearer nope"), &caller())
            .await;
        assert_eq!(wrong.http_status, 401);

        let right = fixture
            .dispatcher
            .handle(body, Some("Bearer hunter2"), &caller())
            .await;
        assert_eq!(right.http_status, 200);
        assert!(right.response.error.is_none());
    }

    #[tokio::test]
    async fn test_auth_disabled_without_configured_key() {
        let fixture = fixture(None);
        let dispatch = fixture
            .dispatcher
            .handle(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, None, &caller())
            .await;
        assert_eq!(dispatch.http_status, 200);
        assert!(dispatch.response.error.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let fixture = fixture(None);
        let dispatch = fixture.dispatcher.handle("{not json", None, &caller()).await;
        assert_eq!(dispatch.http_status, 200);
        assert_eq!(dispatch.response.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn test_wrong_version_is_invalid_request() {
        let fixture = fixture(None);
        let dispatch = fixture
            .dispatcher
            .handle(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#, None, &caller())
            .await;
        assert_eq!(dispatch.response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let fixture = fixture(None);
        let dispatch = fixture
            .dispatcher
            .handle(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/uninstall"}"#,
                None,
                &caller(),
            )
            .await;
        assert_eq!(dispatch.response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_initialize_descriptor() {
        let fixture = fixture(None);
        let dispatch = fixture
            .dispatcher
            .handle(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
                None,
                &caller(),
            )
            .await;
        let result = dispatch.response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "toolgate");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list_catalog() {
        let fixture = fixture(None);
        let dispatch = fixture
            .dispatcher
            .handle(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
                None,
                &caller(),
            )
            .await;
        let result = dispatch.response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert!(!tools.is_empty());
        for tool in tools {
            assert!(!tool["name"].as_str().unwrap().is_empty());
            assert!(!tool["description"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_envelope_and_usage_row() {
        let fixture = fixture(None);
        let result = call_tool(&fixture, "db.drop_everything", json!({})).await;

        assert_eq!(result["status"], 404);
        assert!(result["data"]["error"]
            .as_str()
            .unwrap()
            .contains("db.drop_everything"));
        assert!(!result["traceId"].as_str().unwrap().is_empty());

        let rows = fixture.store.usage_for_tool("db.drop_everything").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].success);
        assert!(rows[0].error.is_some());
    }

    #[tokio::test]
    async fn test_validation_failure_short_circuits() {
        let fixture = fixture(None);
        // knowledge.search requires a query
        let result = call_tool(&fixture, "knowledge.search", json!({})).await;

        assert_eq!(result["status"], 400);
        assert!(result["data"]["error"].as_str().unwrap().contains("query"));

        let rows = fixture.store.usage_for_tool("knowledge.search").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].success);
    }

    #[tokio::test]
    async fn test_successful_call_records_usage() {
        let fixture = fixture(None);
        let result = call_tool(&fixture, "db.stats", json!({})).await;

        assert_eq!(result["status"], 200);
        assert!(result["data"]["tables"].is_array());

        let rows = fixture.store.usage_for_tool("db.stats").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].success);
        assert_eq!(rows[0].category, "database");
    }

    #[tokio::test]
    async fn test_search_call_records_search_analytics() {
        let fixture = fixture(None);
        let result = call_tool(&fixture, "knowledge.search", json!({"query": "refund"})).await;

        assert_eq!(result["status"], 200);
        assert_eq!(result["data"]["expandedQueries"].as_array().unwrap().len(), 4);

        assert_eq!(fixture.store.search_count_for_query("refund").unwrap(), 1);
        assert_eq!(fixture.store.popular_hits("refund").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_failed_search_still_records_search_analytics() {
        let fixture = fixture(None);
        // Knock the content table out so the search itself fails
        fixture.store.query_readonly("DROP TABLE content", 1).unwrap();

        let result = call_tool(&fixture, "knowledge.search", json!({"query": "refund"})).await;

        assert!(result["status"].as_u64().unwrap() >= 500);
        assert_eq!(fixture.store.search_count_for_query("refund").unwrap(), 1);

        let rows = fixture.store.usage_for_tool("knowledge.search").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].success);
    }

    #[tokio::test]
    async fn test_oversized_write_rejected_without_file() {
        let fixture = fixture(None);
        let payload = "x".repeat(250_000);
        let result = call_tool(
            &fixture,
            "fs.write",
            json!({"path": "big.txt", "content": payload}),
        )
        .await;

        assert_eq!(result["status"], 413);
        assert_eq!(result["data"]["sizeBytes"], 250_000);
        assert_eq!(result["data"]["limitBytes"], 200_000);
        assert!(!fixture._dir.path().join("jail").join("big.txt").exists());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_write_cannot_follow_symlink_out_of_jail() {
        let fixture = fixture(None);
        let base = fixture._dir.path();
        std::fs::write(base.join("secret.txt"), "original").unwrap();
        std::os::unix::fs::symlink(base.join("secret.txt"), base.join("jail/link")).unwrap();

        let result = call_tool(
            &fixture,
            "fs.write",
            json!({"path": "link", "content": "overwritten"}),
        )
        .await;

        assert_eq!(result["status"], 403);
        assert_eq!(
            std::fs::read_to_string(base.join("secret.txt")).unwrap(),
            "original"
        );
    }

    #[tokio::test]
    async fn test_ssh_disabled_is_rejected() {
        let fixture = fixture(None);
        let result = call_tool(&fixture, "ssh.exec_allowlist", json!({"command": "uptime"})).await;

        // SSH is disabled in the fixture configuration
        assert_eq!(result["status"], 403);
        assert!(result["data"]["error"].as_str().unwrap().contains("disabled"));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let fixture = fixture(None);
        let result = call_tool(&fixture, "fs.read", json!({"path": "../../etc/passwd"})).await;

        assert_eq!(result["status"], 403);
    }

    #[tokio::test]
    async fn test_notifications_initialized_is_accepted() {
        let fixture = fixture(None);
        let dispatch = fixture
            .dispatcher
            .handle(
                r#"{"jsonrpc":"2.0","id":1,"method":"notifications/initialized"}"#,
                None,
                &caller(),
            )
            .await;
        assert!(dispatch.response.error.is_none());
    }

    #[test]
    fn test_count_results_fields() {
        assert_eq!(count_results(&json!({"results": [1, 2, 3]})), Some(3));
        assert_eq!(count_results(&json!({"rows": []})), Some(0));
        assert_eq!(count_results(&json!({"ok": true})), None);
    }
}
