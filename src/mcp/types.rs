//! MCP protocol types and JSON-RPC 2.0 primitives
//!
//! Only the lifecycle and tool portions of the Model Context Protocol are
//! modelled here. Struct fields are `camelCase` on the wire and `Option<>`
//! fields are omitted from JSON when `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Protocol version constants
// ---------------------------------------------------------------------------

/// The most recent supported MCP protocol revision; offered in `initialize`.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-11-25";

/// All protocol versions that this client accepts during negotiation.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &[
    LATEST_PROTOCOL_VERSION,
    "2025-06-18",
    "2025-03-26",
    "2024-11-05",
];

// ---------------------------------------------------------------------------
// JSON-RPC method constants
// ---------------------------------------------------------------------------

/// Lifecycle: client sends `initialize` to open a session.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Lifecycle: client sends `notifications/initialized` after the server ACKs.
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// Keepalive ping, valid in both directions.
pub const METHOD_PING: &str = "ping";
/// Request a page of available tools.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Invoke a named tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// JSON-RPC code returned for server requests this client does not handle.
pub const METHOD_NOT_FOUND: i64 = -32601;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 wire types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object. `id` is `None` for notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Builds a notification (a request without an `id`).
    pub fn notification(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response object.
///
/// Exactly one of `result` or `error` will be present in a valid response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Mirrors the `id` from the corresponding request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Successful result value; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error object; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful reply to the request identified by `id`.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Error reply to the request identified by `id`.
    pub fn failure(id: serde_json::Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// # Examples
///
/// ```
/// use mcp_agent_client::mcp::types::JsonRpcError;
///
/// let e = JsonRpcError { code: -32600, message: "Invalid Request".to_string(), data: None };
/// assert_eq!(e.to_string(), "JSON-RPC error -32600: Invalid Request");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code as defined by JSON-RPC 2.0 or MCP.
    pub code: i64,
    /// Human-readable error description.
    pub message: String,
    /// Optional additional error context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle types
// ---------------------------------------------------------------------------

/// Identifies a client or server implementation by name and version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    /// Short name of the implementation.
    pub name: String,
    /// Version string.
    pub version: String,
}

impl Implementation {
    /// Identity this crate advertises during `initialize`.
    pub fn this_client() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Capabilities the client advertises. This client offers none beyond the
/// mandatory lifecycle, so every field is usually `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Experimental capability extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<serde_json::Value>,
    /// Filesystem root capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<serde_json::Value>,
    /// LLM sampling capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,
}

/// Capabilities a server advertises in its `initialize` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Experimental capability extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<serde_json::Value>,
    /// Server emits log notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    /// Server exposes prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<serde_json::Value>,
    /// Server exposes resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    /// Server exposes tools via `tools/list` and `tools/call`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
}

/// Parameters sent by the client in the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// The protocol version the client wishes to use.
    pub protocol_version: String,
    /// Capabilities advertised by this client.
    pub capabilities: ClientCapabilities,
    /// Information identifying this client implementation.
    pub client_info: Implementation,
}

/// Response returned by the server to an `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// The protocol version the server has selected for this session.
    pub protocol_version: String,
    /// Capabilities advertised by this server.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Information identifying this server implementation.
    pub server_info: Implementation,
    /// Optional human-readable instructions for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ---------------------------------------------------------------------------
// Tool types
// ---------------------------------------------------------------------------

/// A tool exposed by an MCP server.
///
/// # Examples
///
/// ```
/// use mcp_agent_client::mcp::types::ToolDescriptor;
///
/// let tool: ToolDescriptor = serde_json::from_value(serde_json::json!({
///     "name": "echo",
///     "description": "returns input",
///     "inputSchema": { "type": "object" }
/// })).unwrap();
/// assert_eq!(tool.name, "echo");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique name of the tool within the server.
    pub name: String,
    /// Optional display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable description of the tool's purpose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's input parameters.
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
    /// Behavioral hints for display and safety classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    /// Description text, or an empty string when the server sent none.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Names of the top-level properties declared by the input schema,
    /// sorted alphabetically.
    pub fn parameter_names(&self) -> Vec<String> {
        self.input_schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Parameters for a `tools/list` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsParams {
    /// Cursor returned by the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Response to a `tools/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResponse {
    /// Tools in this page of results.
    pub tools: Vec<ToolDescriptor>,
    /// Opaque cursor for the next page; `None` means this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments to pass to the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

/// Response from a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResponse {
    /// The content items produced by the tool.
    #[serde(default)]
    pub content: Vec<ToolResponseContent>,
    /// When `true`, the tool signalled an error condition within its content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured output matching the tool's output schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
}

impl CallToolResponse {
    /// `true` when the server flagged the result as a tool-level error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Concatenates the text items, separated by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolResponseContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single content item in a tool response.
///
/// Text items are decoded; every other item (images, audio, embedded
/// resources, resource links, and types newer than this client) is kept as
/// the raw JSON object the server sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ToolResponseContent {
    /// Plain text output.
    Text {
        /// The text content.
        text: String,
    },
    /// Any non-text item, unchanged.
    Other(serde_json::Value),
}

impl From<serde_json::Value> for ToolResponseContent {
    fn from(value: serde_json::Value) -> Self {
        let is_text = value.get("type").and_then(|t| t.as_str()) == Some("text");
        match value.get("text").and_then(|t| t.as_str()) {
            Some(text) if is_text => Self::Text {
                text: text.to_string(),
            },
            _ => Self::Other(value),
        }
    }
}

impl From<ToolResponseContent> for serde_json::Value {
    fn from(content: ToolResponseContent) -> Self {
        match content {
            ToolResponseContent::Text { text } => {
                serde_json::json!({ "type": "text", "text": text })
            }
            ToolResponseContent::Other(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_versions_include_latest() {
        assert!(SUPPORTED_PROTOCOL_VERSIONS.contains(&LATEST_PROTOCOL_VERSION));
        assert!(SUPPORTED_PROTOCOL_VERSIONS.contains(&"2024-11-05"));
    }

    #[test]
    fn test_initialize_params_wire_names() {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::this_client(),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["protocolVersion"], LATEST_PROTOCOL_VERSION);
        assert_eq!(json["capabilities"], serde_json::json!({}));
        assert_eq!(json["clientInfo"]["name"], "mcp-agent-client");
    }

    #[test]
    fn test_initialize_response_missing_server_info_fails() {
        let result = serde_json::from_value::<InitializeResponse>(serde_json::json!({
            "protocolVersion": "2025-03-26"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_tool_descriptor_defaults_and_parameter_names() {
        let tool: ToolDescriptor = serde_json::from_value(serde_json::json!({
            "name": "search",
            "inputSchema": {
                "type": "object",
                "properties": { "query": { "type": "string" } }
            }
        }))
        .unwrap();
        assert_eq!(tool.description_text(), "");
        assert_eq!(tool.parameter_names(), vec!["query".to_string()]);

        let several: ToolDescriptor = serde_json::from_value(serde_json::json!({
            "name": "forecast",
            "inputSchema": {
                "type": "object",
                "properties": { "state": {}, "days": {}, "latitude": {} }
            }
        }))
        .unwrap();
        assert_eq!(several.parameter_names(), vec!["days", "latitude", "state"]);

        let bare: ToolDescriptor =
            serde_json::from_value(serde_json::json!({ "name": "noop" })).unwrap();
        assert_eq!(bare.input_schema["type"], "object");
        assert!(bare.parameter_names().is_empty());
    }

    #[test]
    fn test_call_tool_response_text_and_error_flag() {
        let resp: CallToolResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "image", "data": "AAAA", "mimeType": "image/png" },
                { "type": "text", "text": "line two" }
            ],
            "isError": true
        }))
        .unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.text(), "line one\nline two");
    }

    #[test]
    fn test_unknown_content_type_keeps_its_payload() {
        let item = serde_json::json!({
            "type": "resource_link",
            "uri": "file:///tmp/x",
            "name": "x",
            "annotations": { "priority": 0.5 }
        });
        let resp: CallToolResponse = serde_json::from_value(serde_json::json!({
            "content": [item.clone()]
        }))
        .unwrap();
        assert_eq!(resp.content, vec![ToolResponseContent::Other(item.clone())]);
        assert!(!resp.is_error());

        let back = serde_json::to_value(&resp.content[0]).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_text_item_without_text_field_is_kept_raw() {
        let item = serde_json::json!({ "type": "text" });
        let content: ToolResponseContent = serde_json::from_value(item.clone()).unwrap();
        assert_eq!(content, ToolResponseContent::Other(item));
    }

    #[test]
    fn test_notification_has_no_id() {
        let n = JsonRpcRequest::notification(METHOD_INITIALIZED, None);
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["method"], "notifications/initialized");
    }
}
