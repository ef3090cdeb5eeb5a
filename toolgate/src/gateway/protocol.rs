//! JSON-RPC 2.0 protocol types for the gateway

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Request ID (can be null for notifications)
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Optional parameters
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Request ID (matches the request)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Result (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a parse error (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(-32700, message)
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(-32600, message)
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method not found: {}", method))
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(-32602, message)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(-32603, message)
    }

    /// Create an unauthorized error (-32001)
    pub fn unauthorized() -> Self {
        Self::new(-32001, "Unauthorized: missing or invalid API key")
    }

    /// Create a server error (-32000 to -32099)
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(-32000, message)
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Protocol version answered by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server capabilities advertised by `initialize`
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tools capability
    pub tools: ToolsCapability,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: ToolsCapability {},
        }
    }
}

/// Tools capability (empty object indicates tools are supported)
#[derive(Debug, Clone, Serialize, Default)]
pub struct ToolsCapability {}

/// Server info advertised by `initialize`
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "toolgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Uniform envelope returned by `tools/call`.
///
/// Success carries the handler payload in `data`; failure carries
/// `{"error": message, ...extra}` there. `status` is an HTTP-style code so
/// clients can branch without string matching, and `trace_id` correlates the
/// call with server logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// HTTP-style status code
    pub status: u16,
    /// Success payload, or `{"error": ...}` on failure
    pub data: Value,
    /// Per-call correlation token
    pub trace_id: String,
}

impl ToolCallResult {
    /// Wrap a successful payload
    pub fn ok(data: Value, trace_id: impl Into<String>) -> Self {
        Self {
            status: 200,
            data,
            trace_id: trace_id.into(),
        }
    }

    /// Wrap a failure, merging any structured extras next to `error`
    pub fn fail(
        status: u16,
        message: impl Into<String>,
        extra: Option<Value>,
        trace_id: impl Into<String>,
    ) -> Self {
        let mut data = serde_json::Map::new();
        data.insert("error".to_string(), Value::String(message.into()));
        if let Some(Value::Object(fields)) = extra {
            for (key, value) in fields {
                data.insert(key, value);
            }
        }
        Self {
            status,
            data: Value::Object(data),
            trace_id: trace_id.into(),
        }
    }

    /// Wrap a gateway error using its status and extra-field mapping
    pub fn from_error(err: &crate::error::Error, trace_id: impl Into<String>) -> Self {
        Self::fail(err.status(), err.to_string(), err.extra(), trace_id)
    }

    /// Whether the envelope carries a success status
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Generate a trace id: millisecond timestamp plus a random suffix.
pub fn new_trace_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
