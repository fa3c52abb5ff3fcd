//! Streamed chat-completion chunks and normalization of their extension fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::message::{Attachment, CustomContent, StageUpdate};

/// One chunk of a streamed chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Completion ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Choices; only the first one is consumed.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Chunk carrying a single delta.
    pub fn from_delta(delta: Delta) -> Self {
        Self {
            id: None,
            choices: vec![ChunkChoice {
                index: 0,
                delta: Some(delta),
                finish_reason: None,
            }],
        }
    }

    /// Chunk carrying only a text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_delta(Delta {
            content: Some(content.into()),
            ..Default::default()
        })
    }

    /// Chunk carrying only custom content.
    pub fn custom(custom_content: CustomContentDelta) -> Self {
        Self::from_delta(Delta {
            custom_content: Some(custom_content),
            ..Default::default()
        })
    }

    /// Delta of the first choice, if any.
    pub fn delta(&self) -> Option<&Delta> {
        self.choices.first()?.delta.as_ref()
    }
}

/// A choice inside a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    #[serde(default)]
    pub index: u32,
    /// Incremental update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    /// Finish reason on the last chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental update of a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Role, usually only on the first chunk. Kept as text since upstream
    /// agents are free to report roles this crate does not model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Structured extension fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_content: Option<CustomContentDelta>,
}

/// Extension fields of a delta, either as a typed record or as a loose mapping.
///
/// Upstream agents are not consistent here: well-formed payloads decode as
/// [`CustomContentDelta::Record`], while payloads with an off-shape field fall
/// back to a raw mapping that is decoded field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomContentDelta {
    /// Typed record.
    Record(CustomContent),
    /// Loose mapping.
    Mapping(Map<String, Value>),
    /// Anything that is not a mapping at all.
    Unrecognized(Value),
}

impl From<CustomContent> for CustomContentDelta {
    fn from(custom_content: CustomContent) -> Self {
        Self::Record(custom_content)
    }
}

/// Extension fields of one delta after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaExtensions {
    /// State, when present and non-null.
    pub state: Option<Value>,
    /// Top-level attachments.
    pub attachments: Vec<Attachment>,
    /// Stage updates.
    pub stages: Vec<StageUpdate>,
}

impl DeltaExtensions {
    /// Whether nothing survived normalization.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.attachments.is_empty() && self.stages.is_empty()
    }
}

impl CustomContentDelta {
    /// Normalize either representation into [`DeltaExtensions`].
    ///
    /// Fields that cannot be decoded are dropped individually; the rest of
    /// the delta is still used.
    pub fn normalize(&self) -> DeltaExtensions {
        match self {
            Self::Record(record) => DeltaExtensions {
                state: record.state.clone().filter(|s| !s.is_null()),
                attachments: record.attachments.clone(),
                stages: record.stages.clone(),
            },
            Self::Mapping(map) => DeltaExtensions {
                state: map.get("state").filter(|s| !s.is_null()).cloned(),
                attachments: decode_field(map, "attachments"),
                stages: decode_field(map, "stages"),
            },
            Self::Unrecognized(value) => {
                if !value.is_null() {
                    warn!(shape = %shape_of(value), "skipping unrecognized custom_content");
                }
                DeltaExtensions::default()
            }
        }
    }
}

/// Decode a list field, keeping the elements that decode and skipping the rest.
fn decode_field<T: serde::de::DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Vec<T> {
    match map.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match T::deserialize(item) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(field = key, error = %e, "skipping undecodable custom_content entry");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(field = key, shape = %shape_of(other), "skipping custom_content field");
            Vec::new()
        }
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
