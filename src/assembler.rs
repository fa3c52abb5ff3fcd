//! Conversion of an aggregated response into the tool result message.

use crate::aggregator::AggregationState;
use crate::error::Error;
use crate::message::{CustomContent, Message};

/// Build the tool message answering `tool_call_id`.
///
/// Attachments are not repeated here; they were already forwarded to the
/// caller while streaming.
pub fn assemble_result(state: AggregationState, tool_call_id: &str) -> Message {
    Message::tool(tool_call_id, state.content).with_custom_content(CustomContent {
        state: state.result_state,
        attachments: Vec::new(),
        stages: Vec::new(),
    })
}

/// Tool message reporting a failed invocation.
pub fn tool_error_message(tool_call_id: &str, error: &Error) -> Message {
    Message::tool(tool_call_id, format!("Error: {}", error))
}
