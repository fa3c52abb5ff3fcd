//! MCP Protocol definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

/// MCP JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID; absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// MCP JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID (matches request).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Result (on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP JSON-RPC notification (no ID, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Notification payload.
    pub params: Value,
}

impl McpNotification {
    /// Create a notification.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
        }
    }
}

/// MCP error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Method of the notifications carrying live invocation progress.
pub const PROGRESS_METHOD: &str = "notifications/agent/progress";

/// Tool definition for MCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name.
    pub name: String,
    /// Arguments, either as an object or as the raw string the model produced.
    #[serde(default)]
    pub arguments: Value,
    /// Conversation context of the call.
    #[serde(rename = "_meta", default)]
    pub meta: ToolCallMeta,
}

impl ToolCallRequest {
    /// Arguments as the raw JSON text a tool call carries.
    pub fn raw_arguments(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            Value::Null => "{}".into(),
            other => other.to_string(),
        }
    }
}

/// Conversation context attached to a `tools/call` request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMeta {
    /// ID of the tool call being answered.
    #[serde(default)]
    pub tool_call_id: Option<String>,
    /// Conversation ID forwarded to the invoked agent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// API key forwarded to the invoked agent.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Prior conversation.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Tool call result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Content items in the result.
    pub content: Vec<ContentItem>,
    /// The result as a conversation message.
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Whether this is an error result.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// Content item in tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentItem {
    /// Text content.
    #[serde(rename = "text")]
    Text { text: String },
}

impl ContentItem {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Server capabilities for initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

/// Tool-related capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCapabilities {
    /// Whether list_changed notifications are supported.
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}

/// Server information for initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "agent-delegate".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_request_with_meta() {
        let request: ToolCallRequest = serde_json::from_value(json!({
            "name": "web_search_agent",
            "arguments": {"prompt": "news"},
            "_meta": {
                "toolCallId": "call_7",
                "messages": [{"role": "user", "content": "hi"}]
            }
        }))
        .unwrap();

        assert_eq!(request.meta.tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(request.meta.messages, vec![Message::user("hi")]);
        assert_eq!(request.raw_arguments(), r#"{"prompt":"news"}"#);
    }

    #[test]
    fn test_raw_string_arguments_pass_through() {
        let request: ToolCallRequest = serde_json::from_value(json!({
            "name": "x",
            "arguments": "not-json"
        }))
        .unwrap();
        assert_eq!(request.raw_arguments(), "not-json");
        assert!(request.meta.messages.is_empty());
    }
}
