//! Conversation messages and their structured side-channel content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user turn.
    User,
    /// Agent turn.
    Assistant,
    /// Result of a tool call.
    Tool,
}

/// A single message of a chat-completion conversation.
///
/// Messages received from a caller are never patched in place; every
/// transformation in this crate builds a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Plain text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// State, attachments and stages carried next to the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_content: Option<CustomContent>,
    /// Tool calls requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call this message answers (role `tool` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Optional author name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn bare(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            custom_content: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::bare(Role::User, Some(content.into()))
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::bare(Role::Assistant, Some(content.into()))
    }

    /// Create a tool result message.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::bare(Role::Tool, Some(content.into()))
        }
    }

    /// Return this message with `custom_content` replaced.
    pub fn with_custom_content(self, custom_content: CustomContent) -> Self {
        Self {
            custom_content: Some(custom_content),
            ..self
        }
    }

    /// Text content, or the empty string when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// The slice of this message's state owned by `agent`, if the state is a
    /// mapping keyed by that agent.
    pub fn state_for(&self, agent: &str) -> Option<&Value> {
        self.custom_content
            .as_ref()?
            .state
            .as_ref()?
            .as_object()?
            .get(agent)
    }
}

/// Structured data carried alongside plain message text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomContent {
    /// Opaque agent state; top-level keys are agent names by convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Attachments, in order.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Progress stages, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageUpdate>,
}

/// Attachment payload. Passed through untouched; unknown fields survive
/// a decode/encode cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Location of the attached resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Inline data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Reference URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    /// Reference type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attachment {
    /// Attachment pointing at a URL.
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

/// A stage update as reported on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    /// Stage identifier, unique within one response stream.
    #[serde(default)]
    pub index: i64,
    /// Stage name; only meaningful on the first update for an index.
    #[serde(default)]
    pub name: String,
    /// Content to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attachments to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    /// Reported status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StageStatus>,
}

/// Stage status reported by the invoked agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Still producing output.
    InProgress,
    /// Finished.
    Completed,
    /// Anything else; treated like `InProgress`.
    #[serde(other)]
    Other,
}

/// Tool call requested by an assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier.
    pub id: String,
    /// Call type (always "function").
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// Function name and raw arguments.
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".into()
}

impl ToolCall {
    /// Create a function tool call.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus its raw JSON arguments string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// Arguments, as the model produced them.
    #[serde(default)]
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_for_requires_mapping() {
        let keyed = Message::assistant("ok").with_custom_content(CustomContent {
            state: Some(json!({"A": {"x": 1}})),
            ..Default::default()
        });
        assert_eq!(keyed.state_for("A"), Some(&json!({"x": 1})));
        assert_eq!(keyed.state_for("B"), None);

        let scalar = Message::assistant("ok").with_custom_content(CustomContent {
            state: Some(json!("A")),
            ..Default::default()
        });
        assert_eq!(scalar.state_for("A"), None);
    }

    #[test]
    fn test_attachment_keeps_unknown_fields() {
        let raw = json!({"title": "report", "url": "files/r.pdf", "size": 42});
        let attachment: Attachment = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(attachment.title.as_deref(), Some("report"));
        assert_eq!(serde_json::to_value(&attachment).unwrap(), raw);
    }

    #[test]
    fn test_stage_status_tolerates_unknown_values() {
        let update: StageUpdate =
            serde_json::from_value(json!({"index": 2, "status": "failed"})).unwrap();
        assert_eq!(update.status, Some(StageStatus::Other));
        assert_eq!(update.name, "");
    }

    #[test]
    fn test_tool_message_shape() {
        let msg = Message::tool("call_1", "done");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"role": "tool", "content": "done", "tool_call_id": "call_1"}));
    }
}
