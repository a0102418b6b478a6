//! JSON-RPC wire types for the proxied MCP server.
//!
//! One request or response per newline-terminated frame. Requests carry a
//! monotonically assigned integer id; responses are correlated back by that
//! id and may arrive in any order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision sent during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name reported in `clientInfo`.
pub const CLIENT_NAME: &str = "rwx-bridge";

/// JSON-RPC version tag carried by every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Correlation id, unique among outstanding requests.
    pub id: u64,
    /// Method name, e.g. `initialize`, `tools/list`, `tools/call`.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

impl JsonRpcRequest {
    /// Build a request envelope for `method` with `params`.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error object carried by a failed response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured error payload.
    #[serde(default)]
    pub data: Option<Value>,
}

/// Inbound response envelope.
///
/// Exactly one of `result` / `error` is expected to be present; a frame with
/// neither resolves the pending request with `Value::Null`.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    /// Correlation id matching an outstanding request.
    pub id: u64,
    /// Successful result payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload when the call failed remotely.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Remote tool descriptor returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name as registered on the proxied server.
    pub name: String,
    /// Optional human description.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema describing the tool's input object.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// `initialize` request parameters.
#[must_use]
pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}
