//! JSON-RPC gateway: protocol envelope and request dispatch
//!
//! The dispatcher accepts a transport-level request (raw body plus the
//! authorization header), authenticates it, routes the JSON-RPC method, and
//! wraps every tool outcome in a [`ToolCallResult`] envelope. Internal errors
//! never escape unformatted; the caller always receives well-formed JSON.

mod dispatcher;
mod protocol;

pub use dispatcher::{Caller, Dispatch, Dispatcher};
pub use protocol::{
    new_trace_id, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    ToolCallResult, PROTOCOL_VERSION,
};
