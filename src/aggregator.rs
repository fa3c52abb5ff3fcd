//! Aggregation of an invoked agent's streamed response.

use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::chunk::ChatCompletionChunk;
use crate::error::{Error, Result};
use crate::stage::{ProgressEvent, ProgressSurface, StageArena};

/// Everything collected from one response stream.
#[derive(Debug, Default)]
pub struct AggregationState {
    /// Concatenated text deltas.
    pub content: String,
    /// Last non-null state reported.
    pub result_state: Option<Value>,
    /// Stage handles opened during the stream.
    pub stages: StageArena,
}

/// Folds response chunks into an [`AggregationState`] while mirroring
/// progress to a live surface.
///
/// Stages left open are closed when the stream ends, when it fails, and when
/// the aggregator is dropped mid-stream (for example because the invocation
/// future was cancelled).
pub struct ChunkAggregator<'a> {
    state: AggregationState,
    surface: &'a mut dyn ProgressSurface,
    idle_timeout: Option<Duration>,
    chunks: usize,
}

impl<'a> ChunkAggregator<'a> {
    /// Create an aggregator publishing to `surface`.
    pub fn new(surface: &'a mut dyn ProgressSurface) -> Self {
        Self {
            state: AggregationState::default(),
            surface,
            idle_timeout: None,
            chunks: 0,
        }
    }

    /// Fail with [`Error::Timeout`] when no chunk arrives within `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// State accumulated so far.
    pub fn state(&self) -> &AggregationState {
        &self.state
    }

    /// Apply a single chunk.
    pub fn apply(&mut self, chunk: &ChatCompletionChunk) {
        self.chunks += 1;
        let Some(delta) = chunk.delta() else {
            return;
        };

        if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
            self.state.content.push_str(text);
            self.surface.emit(ProgressEvent::Content {
                text: text.to_string(),
            });
        }

        let Some(custom_content) = &delta.custom_content else {
            return;
        };
        let extensions = custom_content.normalize();

        if let Some(state) = extensions.state {
            self.state.result_state = Some(state);
        }
        for attachment in extensions.attachments {
            self.surface.emit(ProgressEvent::Attachment { attachment });
        }
        for update in &extensions.stages {
            self.state.stages.apply(update, &mut *self.surface);
        }
    }

    /// Consume `stream` to its end and return the final state.
    ///
    /// On a stream error every open stage is closed before the error is
    /// returned. Progress already published stays published.
    pub async fn consume<S>(mut self, mut stream: S) -> Result<AggregationState>
    where
        S: Stream<Item = Result<ChatCompletionChunk>> + Unpin,
    {
        loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => Some(Err(Error::Timeout(format!(
                        "no chunk received within {}s",
                        limit.as_secs_f64()
                    )))),
                },
                None => stream.next().await,
            };

            match next {
                Some(Ok(chunk)) => self.apply(&chunk),
                Some(Err(err)) => {
                    let closed = self.close_open_stages();
                    warn!(
                        chunks = self.chunks,
                        closed_stages = closed,
                        error = %err,
                        "response stream failed"
                    );
                    return Err(err);
                }
                None => break,
            }
        }

        debug!(chunks = self.chunks, "response stream finished");
        Ok(self.finish())
    }

    /// Close remaining stages and hand over the state.
    pub fn finish(mut self) -> AggregationState {
        let closed = self.close_open_stages();
        if closed > 0 {
            debug!(closed, "closed stages left open at end of stream");
        }
        std::mem::take(&mut self.state)
    }

    fn close_open_stages(&mut self) -> usize {
        self.state.stages.close_all(&mut *self.surface)
    }
}

impl Drop for ChunkAggregator<'_> {
    fn drop(&mut self) {
        let closed = self.close_open_stages();
        if closed > 0 {
            warn!(closed, "invocation abandoned mid-stream, closed open stages");
        }
    }
}
