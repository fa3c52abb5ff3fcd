//! Tool-call argument extraction.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Typed view of an agent tool call's arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvocationRequest {
    /// Prompt sent to the invoked agent.
    pub prompt: String,
    /// Whether the agent's own prior turns are replayed to it.
    pub propagate_history: bool,
}

impl InvocationRequest {
    /// Parse the raw arguments string of a tool call.
    ///
    /// Only invalid JSON is an error. Missing or mistyped fields fall back to
    /// their defaults (`""` and `false`), and so does a payload that is valid
    /// JSON but not an object.
    pub fn from_arguments(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| Error::MalformedArguments(e.to_string()))?;
        Ok(Self::from_value(&value))
    }

    /// Extract from already-decoded arguments.
    pub fn from_value(value: &Value) -> Self {
        Self {
            prompt: value
                .get("prompt")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            propagate_history: value
                .get("propagate_history")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// JSON Schema advertised for agent tools.
    pub fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The request for the agent"
                },
                "propagate_history": {
                    "type": "boolean",
                    "description": "Replay the agent's earlier turns from this conversation",
                    "default": false
                }
            },
            "required": ["prompt"]
        })
    }
}
