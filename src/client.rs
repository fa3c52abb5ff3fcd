//! Streamed chat-completion client used to call other agents.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::chunk::ChatCompletionChunk;
use crate::error::{Error, Result};
use crate::message::Message;

/// Stream of decoded response chunks.
pub type ChunkStream = BoxStream<'static, Result<ChatCompletionChunk>>;

/// API version sent when none is configured.
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// One streamed completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Deployment name of the agent to call.
    pub deployment: String,
    /// Conversation sent as the agent's input.
    pub messages: Vec<Message>,
    /// Per-call API key; falls back to the client's key.
    pub api_key: Option<String>,
    /// Conversation the call belongs to.
    pub conversation_id: Option<String>,
}

/// Something that can open a streamed chat completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Start the call and return its chunk stream.
    async fn stream_completion(&self, request: CompletionRequest) -> Result<ChunkStream>;
}

/// Completion client speaking OpenAI-style SSE over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Create a client for the deployments under `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.into(),
            api_key: None,
        }
    }

    /// Set the API version query parameter.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the default API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, deployment
        )
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<ChunkStream> {
        let url = self.completions_url(&request.deployment);
        debug!(url = %url, messages = request.messages.len(), "opening completion stream");

        let mut builder = self
            .http
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .json(&json!({
                "messages": request.messages,
                "stream": true,
            }));
        if let Some(api_key) = request.api_key.as_ref().or(self.api_key.as_ref()) {
            builder = builder.header("Api-Key", api_key);
        }
        if let Some(conversation_id) = &request.conversation_id {
            builder = builder.header("X-Conversation-Id", conversation_id);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".into());
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(sse_chunks(
            response.bytes_stream().map(|r| r.map_err(Error::from)),
        ))
    }
}

enum SseLine {
    Chunk(ChatCompletionChunk),
    Failed(Error),
    Done,
    Skip,
}

/// Decode an SSE byte stream into completion chunks, stopping at `[DONE]`.
pub fn sse_chunks<S, B>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        'read: while let Some(next) = bytes.next().await {
            let next = match next {
                Ok(next) => next,
                Err(err) => {
                    yield Err(err);
                    finished = true;
                    break 'read;
                }
            };
            buffer.extend_from_slice(next.as_ref());

            while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                match parse_line(&line) {
                    SseLine::Chunk(chunk) => yield Ok(chunk),
                    SseLine::Failed(err) => {
                        yield Err(err);
                        finished = true;
                        break 'read;
                    }
                    SseLine::Done => {
                        finished = true;
                        break 'read;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        if !finished && !buffer.is_empty() {
            match parse_line(&buffer) {
                SseLine::Chunk(chunk) => yield Ok(chunk),
                SseLine::Failed(err) => yield Err(err),
                SseLine::Done | SseLine::Skip => {}
            }
        }
    })
}

fn parse_line(line: &[u8]) -> SseLine {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseLine::Skip;
    }
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping undecodable stream frame");
            return SseLine::Skip;
        }
    };
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return SseLine::Failed(Error::StreamTransport(message));
    }
    match serde_json::from_value(value) {
        Ok(chunk) => SseLine::Chunk(chunk),
        Err(e) => {
            warn!(error = %e, "skipping stream frame with unexpected shape");
            SseLine::Skip
        }
    }
}
