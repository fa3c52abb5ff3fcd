//! Tools that delegate to other agents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::aggregator::ChunkAggregator;
use crate::arguments::InvocationRequest;
use crate::assembler::{assemble_result, tool_error_message};
use crate::client::{CompletionClient, CompletionRequest};
use crate::config::{AgentConfig, DelegateConfig};
use crate::error::{Error, Result};
use crate::history::reconstruct_history;
use crate::message::{Message, ToolCall};
use crate::protocol::ToolDefinition;
use crate::stage::ProgressSurface;

/// Tool trait for implementing callable tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool call and produce its result message.
    async fn execute(&self, params: ToolCallParams<'_>) -> Result<Message>;
}

/// Everything a tool needs to answer one tool call.
pub struct ToolCallParams<'a> {
    /// The call being answered.
    pub tool_call: &'a ToolCall,
    /// Conversation up to (not including) the call's result.
    pub messages: &'a [Message],
    /// API key to forward, if the caller has one.
    pub api_key: Option<String>,
    /// Conversation the call belongs to.
    pub conversation_id: Option<String>,
    /// Live progress surface of the calling agent.
    pub surface: &'a mut dyn ProgressSurface,
}

/// Tool that invokes another agent through a streamed completion.
pub struct AgentTool {
    agent: AgentConfig,
    client: Arc<dyn CompletionClient>,
    idle_timeout: Duration,
}

impl AgentTool {
    /// Create a tool for `agent`.
    pub fn new(agent: AgentConfig, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            agent,
            client,
            idle_timeout: Duration::from_secs(120),
        }
    }

    /// Set how long to wait for the stream to open and for each chunk.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }}

#[async_trait]
impl Tool for AgentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.agent.name.clone(),
            description: self.agent.description.clone(),
            input_schema: InvocationRequest::input_schema(),
        }
    }

    async fn execute(&self, params: ToolCallParams<'_>) -> Result<Message> {
        let ToolCallParams {
            tool_call,
            messages,
            api_key,
            conversation_id,
            surface,
        } = params;

        let request = InvocationRequest::from_arguments(&tool_call.function.arguments)?;
        let history = reconstruct_history(messages, &self.agent.name, &request);

        info!(
            agent = %self.agent.name,
            deployment = %self.agent.deployment,
            tool_call_id = %tool_call.id,
            propagate_history = request.propagate_history,
            messages = history.len(),
            "invoking agent"
        );

        let open = self.client.stream_completion(CompletionRequest {
            deployment: self.agent.deployment.clone(),
            messages: history,
            api_key,
            conversation_id,
        });
        let stream = tokio::time::timeout(self.idle_timeout, open)
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} did not start responding within {}s",
                    self.agent.deployment,
                    self.idle_timeout.as_secs_f64()
                ))
            })??;

        let state = ChunkAggregator::new(surface)
            .with_idle_timeout(self.idle_timeout)
            .consume(stream)
            .await?;

        info!(
            agent = %self.agent.name,
            tool_call_id = %tool_call.id,
            content_len = state.content.len(),
            stages = state.stages.len(),
            has_state = state.result_state.is_some(),
            "agent finished"
        );

        Ok(assemble_result(state, &tool_call.id))
    }
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with one [`AgentTool`] per configured agent.
    pub fn from_config(config: &DelegateConfig, client: Arc<dyn CompletionClient>) -> Self {
        let mut registry = Self::new();
        for agent in &config.agents {
            let tool = AgentTool::new(agent.clone(), client.clone())
                .with_idle_timeout(config.timeout());
            registry.register(Arc::new(tool));
        }
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    /// Get all tool definitions, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Execute the tool named by the call.
    pub async fn execute(&self, params: ToolCallParams<'_>) -> Result<Message> {
        let tool_call = params.tool_call;
        let name = &tool_call.function.name;
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.clone()))?;

        tool.execute(params).await
    }

    /// Execute the call, turning a failure into an error tool message.
    pub async fn invoke(&self, params: ToolCallParams<'_>) -> Message {
        let tool_call_id = params.tool_call.id.clone();
        let tool_name = params.tool_call.function.name.clone();
        match self.execute(params).await {
            Ok(message) => message,
            Err(e) => {
                error!(tool = %tool_name, tool_call_id = %tool_call_id, error = %e, "tool call failed");
                tool_error_message(&tool_call_id, &e)
            }
        }
    }
}
