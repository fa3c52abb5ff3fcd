//! MCP server exposing agents as tools.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assembler::tool_error_message;
use crate::error::{Error, Result};
use crate::message::ToolCall;
use crate::protocol::{
    error_codes, ContentItem, McpNotification, McpRequest, McpResponse, ServerCapabilities,
    ServerInfo, ToolCallRequest, ToolCallResult, ToolCapabilities, PROGRESS_METHOD,
};
use crate::stage::{ProgressEvent, ProgressSurface};
use crate::tools::{ToolCallParams, ToolRegistry};

/// Line-oriented JSON-RPC writer shared by responses and notifications.
#[derive(Clone)]
pub struct Outbound {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Outbound {
    /// Wrap a writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write one message as a single line.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let line = serde_json::to_string(message)?;
        debug!("Sending: {}", line);

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::Internal("output writer poisoned".into()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Progress surface that publishes each event as a JSON-RPC notification.
pub struct NotificationSurface {
    out: Outbound,
    tool_call_id: String,
}

impl NotificationSurface {
    /// Publish progress of `tool_call_id` on `out`.
    pub fn new(out: Outbound, tool_call_id: impl Into<String>) -> Self {
        Self {
            out,
            tool_call_id: tool_call_id.into(),
        }
    }
}

impl ProgressSurface for NotificationSurface {
    fn emit(&mut self, event: ProgressEvent) {
        let notification = McpNotification::new(
            PROGRESS_METHOD,
            json!({ "toolCallId": self.tool_call_id, "event": event }),
        );
        if let Err(e) = self.out.send(&notification) {
            warn!(tool_call_id = %self.tool_call_id, error = %e, "failed to publish progress");
        }
    }
}

/// Agent MCP Server.
pub struct AgentMcpServer {
    /// Tool registry.
    registry: ToolRegistry,
    /// Server info.
    server_info: ServerInfo,
}

impl AgentMcpServer {
    /// Create a new MCP server.
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            server_info: ServerInfo::default(),
        }
    }

    /// Run the server on stdio.
    pub async fn run_stdio(&mut self) -> Result<()> {
        info!("Starting Agent MCP Server on stdio");
        let stdin = std::io::stdin();
        self.serve(stdin.lock(), std::io::stdout()).await
    }

    /// Serve requests read line by line from `reader`.
    pub async fn serve<R: BufRead>(
        &mut self,
        reader: R,
        writer: impl Write + Send + 'static,
    ) -> Result<()> {
        let out = Outbound::new(writer);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            if let Some(response) = self.handle_message(&line, &out).await {
                out.send(&response)?;
            }
        }

        info!("Input closed, stopping");
        Ok(())
    }

    /// Handle a single message. Notifications get no response.
    async fn handle_message(&mut self, message: &str, out: &Outbound) -> Option<McpResponse> {
        // Parse request
        let request: McpRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                return Some(McpResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    e.to_string(),
                ));
            }
        };

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request),
            "initialized" | "notifications/initialized" => self.handle_initialized(&request),
            "tools/list" => self.handle_tools_list(&request),
            "tools/call" => self.handle_tools_call(&request, out).await,
            "ping" => self.handle_ping(&request),
            _ => McpResponse::error(
                request.id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("unknown method: {}", request.method),
            ),
        };

        request.id.is_some().then_some(response)
    }

    /// Handle initialize request.
    fn handle_initialize(&mut self, request: &McpRequest) -> McpResponse {
        info!("Initializing MCP server");

        let capabilities = ServerCapabilities {
            tools: Some(ToolCapabilities { list_changed: false }),
        };

        McpResponse::success(
            request.id.clone(),
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": capabilities,
                "serverInfo": self.server_info
            }),
        )
    }

    /// Handle initialized notification.
    fn handle_initialized(&self, request: &McpRequest) -> McpResponse {
        info!("MCP server initialized");

        McpResponse::success(request.id.clone(), json!({}))
    }

    /// Handle tools/list request.
    fn handle_tools_list(&self, request: &McpRequest) -> McpResponse {
        let tools = self.registry.definitions();

        McpResponse::success(
            request.id.clone(),
            json!({
                "tools": tools
            }),
        )
    }

    /// Handle tools/call request.
    async fn handle_tools_call(&self, request: &McpRequest, out: &Outbound) -> McpResponse {
        let call: ToolCallRequest = match serde_json::from_value(request.params.clone()) {
            Ok(call) => call,
            Err(e) => {
                return McpResponse::error(
                    request.id.clone(),
                    error_codes::INVALID_PARAMS,
                    format!("invalid tools/call params: {}", e),
                );
            }
        };

        let tool_call_id = call
            .meta
            .tool_call_id
            .clone()
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
        let tool_call = ToolCall::function(tool_call_id, call.name.clone(), call.raw_arguments());

        info!("Calling tool: {} ({})", call.name, tool_call.id);

        let mut surface = NotificationSurface::new(out.clone(), tool_call.id.clone());
        let outcome = self
            .registry
            .execute(ToolCallParams {
                tool_call: &tool_call,
                messages: &call.meta.messages,
                api_key: call.meta.api_key.clone(),
                conversation_id: call.meta.conversation_id.clone(),
                surface: &mut surface,
            })
            .await;

        let (message, is_error) = match outcome {
            Ok(message) => (message, false),
            Err(Error::UnknownTool(name)) => {
                return McpResponse::error(
                    request.id.clone(),
                    error_codes::INVALID_PARAMS,
                    format!("unknown tool: {}", name),
                );
            }
            Err(e) => {
                error!("Tool execution failed: {}", e);
                (tool_error_message(&tool_call.id, &e), true)
            }
        };

        let result = ToolCallResult {
            content: vec![ContentItem::text(message.text())],
            structured_content: serde_json::to_value(&message).ok(),
            is_error,
        };
        match serde_json::to_value(result) {
            Ok(value) => McpResponse::success(request.id.clone(), value),
            Err(e) => McpResponse::error(
                request.id.clone(),
                error_codes::INTERNAL_ERROR,
                e.to_string(),
            ),
        }
    }

    /// Handle ping request.
    fn handle_ping(&self, request: &McpRequest) -> McpResponse {
        McpResponse::success(request.id.clone(), json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use serde_json::Value;

    use crate::chunk::ChatCompletionChunk;
    use crate::client::{ChunkStream, CompletionClient, CompletionRequest};
    use crate::config::DelegateConfig;
    use crate::message::{CustomContent, StageStatus, StageUpdate};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        async fn stream_completion(&self, request: CompletionRequest) -> Result<ChunkStream> {
            let prompt = request.messages.last().map(|m| m.text().to_string()).unwrap_or_default();
            let stage = ChatCompletionChunk::custom(
                CustomContent {
                    stages: vec![StageUpdate {
                        index: 0,
                        name: "echo".into(),
                        status: Some(StageStatus::Completed),
                        ..Default::default()
                    }],
                    ..Default::default()
                }
                .into(),
            );
            let chunks = vec![Ok(stage), Ok(ChatCompletionChunk::text(prompt))];
            Ok(stream::iter(chunks).boxed())
        }
    }

    fn server() -> AgentMcpServer {
        AgentMcpServer::new(ToolRegistry::from_config(
            &DelegateConfig::default(),
            Arc::new(EchoClient),
        ))
    }

    async fn exchange(requests: &[Value]) -> Vec<Value> {
        let input = requests
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let output = SharedBuf::default();
        server()
            .serve(Cursor::new(input), output.clone())
            .await
            .unwrap();
        output.lines()
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let lines = exchange(&[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ])
        .await;

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"]["serverInfo"]["name"], "agent-delegate");
        let tools = lines[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0]["name"], "calculations_agent");
    }

    #[tokio::test]
    async fn test_tool_call_streams_progress_then_result() {
        let lines = exchange(&[json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {
                "name": "web_search_agent",
                "arguments": {"prompt": "rust news"},
                "_meta": {"toolCallId": "call_w"}
            }
        })])
        .await;

        let methods: Vec<&str> = lines
            .iter()
            .filter_map(|l| l["method"].as_str())
            .collect();
        assert_eq!(methods, vec![PROGRESS_METHOD; 3]);
        assert_eq!(lines[0]["params"]["toolCallId"], "call_w");
        assert_eq!(lines[0]["params"]["event"]["type"], "stage_opened");
        assert_eq!(lines[2]["params"]["event"], json!({"type": "content", "text": "rust news"}));

        let result = &lines[3]["result"];
        assert_eq!(lines[3]["id"], 3);
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], "rust news");
        assert_eq!(result["structuredContent"]["role"], "tool");
        assert_eq!(result["structuredContent"]["tool_call_id"], "call_w");
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_error_results() {
        let lines = exchange(&[json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "calculations_agent", "arguments": "{oops"}
        })])
        .await;

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["result"]["isError"], true);
        let text = lines[0]["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error: malformed tool arguments"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_method() {
        let lines = exchange(&[
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "nope"}}),
            json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list"}),
            json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}),
        ])
        .await;

        assert_eq!(lines[0]["error"]["code"], error_codes::INVALID_PARAMS);
        assert_eq!(lines[1]["error"]["code"], error_codes::METHOD_NOT_FOUND);
        assert_eq!(lines[2]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let output = SharedBuf::default();
        server()
            .serve(Cursor::new("{not json\n"), output.clone())
            .await
            .unwrap();
        let lines = output.lines();
        assert_eq!(lines[0]["error"]["code"], error_codes::PARSE_ERROR);
    }
}
