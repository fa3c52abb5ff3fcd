//! Agent Delegation
//!
//! This crate lets one chat-completion agent call another agent as if it were
//! a tool. The call opens a streamed completion against the invoked agent and
//! folds the stream back into a single tool result:
//!
//! - Tool-call arguments are read leniently into a prompt plus a
//!   history-propagation flag
//! - The invoked agent's own earlier turns can be replayed to it, with shared
//!   state narrowed to its own slice
//! - Text, attachments and nested progress stages are mirrored to the
//!   caller's live progress surface while the stream runs
//! - The final text and last reported state become one `tool` message
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Calling agent / MCP client                    │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ tool call (prompt, propagate_history)
//!                             ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        agent-delegate                         │
//! │  ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │
//! │  │ Argument  │→ │ History   │→ │ Chunk      │→ │ Result   │  │
//! │  │ Extractor │  │ Rebuilder │  │ Aggregator │  │ Assembler│  │
//! │  └───────────┘  └───────────┘  └─────┬──────┘  └──────────┘  │
//! │                                      │ stage tree, live events │
//! └──────────────────────────────────────┼─────────────────────────┘
//!                  streamed completion    │
//!                             ▼           ▼
//!                   ┌──────────────┐  progress notifications
//!                   │ invoked agent│
//!                   └──────────────┘
//! ```

pub mod aggregator;
pub mod arguments;
pub mod assembler;
pub mod chunk;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod message;
pub mod protocol;
pub mod server;
pub mod stage;
pub mod tools;

pub use aggregator::{AggregationState, ChunkAggregator};
pub use arguments::InvocationRequest;
pub use assembler::assemble_result;
pub use client::{CompletionClient, HttpCompletionClient};
pub use config::{AgentConfig, DelegateConfig};
pub use error::{Error, Result};
pub use history::reconstruct_history;
pub use message::{Attachment, CustomContent, Message, Role};
pub use server::AgentMcpServer;
pub use stage::{ProgressEvent, ProgressSurface, StageArena};
pub use tools::{AgentTool, Tool, ToolCallParams, ToolRegistry};
