//! UI message stream chunk protocol.
//!
//! Chunks are the provider-agnostic events a stream consumer sees. Each
//! streamed part (one text run, one reasoning run, one tool call) occupies
//! its own part id from its `*-start` chunk to its matching terminal chunk;
//! a closed id is never reopened.
//!
//! The wire shape is `{ "type": "<kind>", ...fields }` with camelCase field
//! names. `data-<name>` chunks carry caller-defined side-channel payloads:
//! their `type` identifier is literally `data-<name>`, which is why this
//! module hand-writes the serde implementations instead of deriving them.

use std::pin::Pin;

use futures::Stream;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::FinishReason;

/// Caller-defined named payload (`type: "data-<name>"`).
///
/// Transient data chunks are delivered to live consumers but are not part
/// of the durable message history.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChunk {
    pub name: String,
    pub data: Value,
    pub transient: Option<bool>,
}

impl DataChunk {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            transient: None,
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = Some(true);
        self
    }

    pub fn chunk_type(&self) -> String {
        format!("data-{}", self.name)
    }
}

/// One discrete event in the outward streaming protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum UiMessageChunk {
    /// First chunk of the stream.
    Start { message_id: Option<String> },
    /// A new step begins contributing chunks.
    StartStep,
    /// The current step settled (all its tool calls resolved or deferred).
    FinishStep,

    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },

    ReasoningStart { id: String },
    ReasoningDelta { id: String, delta: String },
    ReasoningEnd { id: String },

    /// A tool call began streaming its arguments; the part id is the call id.
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
        provider_executed: Option<bool>,
        dynamic: Option<bool>,
    },
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    /// Arguments validated; terminal chunk of the input part.
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        provider_executed: Option<bool>,
        dynamic: Option<bool>,
    },
    /// Arguments failed validation terminally.
    ToolInputError {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        error_text: String,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
        provider_executed: Option<bool>,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        provider_executed: Option<bool>,
    },

    SourceUrl {
        source_id: String,
        url: String,
        title: Option<String>,
    },
    File {
        media_type: String,
        data: String,
    },

    /// Caller-defined side-channel payload.
    Data(DataChunk),
    /// Arbitrary metadata attached to the message being streamed.
    MessageMetadata { metadata: Value },

    Error { error_text: String },
    Abort { reason: Option<String> },
    /// Terminal chunk of the stream.
    Finish { finish_reason: Option<FinishReason> },
}

/// Stream of UI message chunks delivered to a single consumer.
pub type UiMessageStream = Pin<Box<dyn Stream<Item = UiMessageChunk> + Send>>;

fn parse_finish_reason(s: &str) -> FinishReason {
    match s {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content-filter" => FinishReason::ContentFilter,
        "tool-calls" => FinishReason::ToolCalls,
        "error" => FinishReason::Error,
        "other" => FinishReason::Other(String::new()),
        _ => FinishReason::Unknown,
    }
}

fn put_opt(map: &mut Map<String, Value>, key: &str, value: &Option<bool>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::Bool(*v));
    }
}

impl UiMessageChunk {
    /// The wire `type` identifier of this chunk.
    pub fn chunk_type(&self) -> String {
        match self {
            Self::Start { .. } => "start".into(),
            Self::StartStep => "start-step".into(),
            Self::FinishStep => "finish-step".into(),
            Self::TextStart { .. } => "text-start".into(),
            Self::TextDelta { .. } => "text-delta".into(),
            Self::TextEnd { .. } => "text-end".into(),
            Self::ReasoningStart { .. } => "reasoning-start".into(),
            Self::ReasoningDelta { .. } => "reasoning-delta".into(),
            Self::ReasoningEnd { .. } => "reasoning-end".into(),
            Self::ToolInputStart { .. } => "tool-input-start".into(),
            Self::ToolInputDelta { .. } => "tool-input-delta".into(),
            Self::ToolInputAvailable { .. } => "tool-input-available".into(),
            Self::ToolInputError { .. } => "tool-input-error".into(),
            Self::ToolOutputAvailable { .. } => "tool-output-available".into(),
            Self::ToolOutputError { .. } => "tool-output-error".into(),
            Self::SourceUrl { .. } => "source-url".into(),
            Self::File { .. } => "file".into(),
            Self::Data(data) => data.chunk_type(),
            Self::MessageMetadata { .. } => "message-metadata".into(),
            Self::Error { .. } => "error".into(),
            Self::Abort { .. } => "abort".into(),
            Self::Finish { .. } => "finish".into(),
        }
    }

    /// Part id scoping this chunk, when it belongs to a framed part.
    pub fn part_id(&self) -> Option<&str> {
        match self {
            Self::TextStart { id }
            | Self::TextDelta { id, .. }
            | Self::TextEnd { id }
            | Self::ReasoningStart { id }
            | Self::ReasoningDelta { id, .. }
            | Self::ReasoningEnd { id } => Some(id),
            Self::ToolInputStart { tool_call_id, .. }
            | Self::ToolInputDelta { tool_call_id, .. }
            | Self::ToolInputAvailable { tool_call_id, .. }
            | Self::ToolInputError { tool_call_id, .. }
            | Self::ToolOutputAvailable { tool_call_id, .. }
            | Self::ToolOutputError { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    /// JSON wire representation of this chunk.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.chunk_type()));
        match self {
            Self::Start { message_id } => {
                if let Some(id) = message_id {
                    map.insert("messageId".into(), Value::String(id.clone()));
                }
            }
            Self::StartStep | Self::FinishStep => {}
            Self::TextStart { id } | Self::TextEnd { id } | Self::ReasoningStart { id }
            | Self::ReasoningEnd { id } => {
                map.insert("id".into(), Value::String(id.clone()));
            }
            Self::TextDelta { id, delta } | Self::ReasoningDelta { id, delta } => {
                map.insert("id".into(), Value::String(id.clone()));
                map.insert("delta".into(), Value::String(delta.clone()));
            }
            Self::ToolInputStart {
                tool_call_id,
                tool_name,
                provider_executed,
                dynamic,
            } => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.clone()));
                map.insert("toolName".into(), Value::String(tool_name.clone()));
                put_opt(&mut map, "providerExecuted", provider_executed);
                put_opt(&mut map, "dynamic", dynamic);
            }
            Self::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.clone()));
                map.insert(
                    "inputTextDelta".into(),
                    Value::String(input_text_delta.clone()),
                );
            }
            Self::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
                provider_executed,
                dynamic,
            } => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.clone()));
                map.insert("toolName".into(), Value::String(tool_name.clone()));
                map.insert("input".into(), input.clone());
                put_opt(&mut map, "providerExecuted", provider_executed);
                put_opt(&mut map, "dynamic", dynamic);
            }
            Self::ToolInputError {
                tool_call_id,
                tool_name,
                input,
                error_text,
            } => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.clone()));
                map.insert("toolName".into(), Value::String(tool_name.clone()));
                map.insert("input".into(), input.clone());
                map.insert("errorText".into(), Value::String(error_text.clone()));
            }
            Self::ToolOutputAvailable {
                tool_call_id,
                output,
                provider_executed,
            } => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.clone()));
                map.insert("output".into(), output.clone());
                put_opt(&mut map, "providerExecuted", provider_executed);
            }
            Self::ToolOutputError {
                tool_call_id,
                error_text,
                provider_executed,
            } => {
                map.insert("toolCallId".into(), Value::String(tool_call_id.clone()));
                map.insert("errorText".into(), Value::String(error_text.clone()));
                put_opt(&mut map, "providerExecuted", provider_executed);
            }
            Self::SourceUrl {
                source_id,
                url,
                title,
            } => {
                map.insert("sourceId".into(), Value::String(source_id.clone()));
                map.insert("url".into(), Value::String(url.clone()));
                if let Some(title) = title {
                    map.insert("title".into(), Value::String(title.clone()));
                }
            }
            Self::File { media_type, data } => {
                map.insert("mediaType".into(), Value::String(media_type.clone()));
                map.insert("data".into(), Value::String(data.clone()));
            }
            Self::Data(chunk) => {
                map.insert("data".into(), chunk.data.clone());
                if let Some(transient) = chunk.transient {
                    map.insert("transient".into(), Value::Bool(transient));
                }
            }
            Self::MessageMetadata { metadata } => {
                map.insert("messageMetadata".into(), metadata.clone());
            }
            Self::Error { error_text } => {
                map.insert("errorText".into(), Value::String(error_text.clone()));
            }
            Self::Abort { reason } => {
                if let Some(reason) = reason {
                    map.insert("reason".into(), Value::String(reason.clone()));
                }
            }
            Self::Finish { finish_reason } => {
                if let Some(reason) = finish_reason {
                    map.insert(
                        "finishReason".into(),
                        Value::String(reason.as_str().to_string()),
                    );
                }
            }
        }
        Value::Object(map)
    }

    /// Parse a chunk from its JSON wire representation.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("chunk is not a JSON object")?;
        let chunk_type = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or("chunk has no 'type' field")?;

        let str_field = |key: &str| -> Result<String, String> {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| format!("chunk '{chunk_type}' missing field '{key}'"))
        };
        let opt_str = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(String::from);
        let opt_bool = |key: &str| obj.get(key).and_then(|v| v.as_bool());
        let value_field = |key: &str| obj.get(key).cloned().unwrap_or(Value::Null);

        if let Some(name) = chunk_type.strip_prefix("data-") {
            return Ok(Self::Data(DataChunk {
                name: name.to_string(),
                data: value_field("data"),
                transient: opt_bool("transient"),
            }));
        }

        let chunk = match chunk_type {
            "start" => Self::Start {
                message_id: opt_str("messageId"),
            },
            "start-step" => Self::StartStep,
            "finish-step" => Self::FinishStep,
            "text-start" => Self::TextStart {
                id: str_field("id")?,
            },
            "text-delta" => Self::TextDelta {
                id: str_field("id")?,
                delta: str_field("delta")?,
            },
            "text-end" => Self::TextEnd {
                id: str_field("id")?,
            },
            "reasoning-start" => Self::ReasoningStart {
                id: str_field("id")?,
            },
            "reasoning-delta" => Self::ReasoningDelta {
                id: str_field("id")?,
                delta: str_field("delta")?,
            },
            "reasoning-end" => Self::ReasoningEnd {
                id: str_field("id")?,
            },
            "tool-input-start" => Self::ToolInputStart {
                tool_call_id: str_field("toolCallId")?,
                tool_name: str_field("toolName")?,
                provider_executed: opt_bool("providerExecuted"),
                dynamic: opt_bool("dynamic"),
            },
            "tool-input-delta" => Self::ToolInputDelta {
                tool_call_id: str_field("toolCallId")?,
                input_text_delta: str_field("inputTextDelta")?,
            },
            "tool-input-available" => Self::ToolInputAvailable {
                tool_call_id: str_field("toolCallId")?,
                tool_name: str_field("toolName")?,
                input: value_field("input"),
                provider_executed: opt_bool("providerExecuted"),
                dynamic: opt_bool("dynamic"),
            },
            "tool-input-error" => Self::ToolInputError {
                tool_call_id: str_field("toolCallId")?,
                tool_name: str_field("toolName")?,
                input: value_field("input"),
                error_text: str_field("errorText")?,
            },
            "tool-output-available" => Self::ToolOutputAvailable {
                tool_call_id: str_field("toolCallId")?,
                output: value_field("output"),
                provider_executed: opt_bool("providerExecuted"),
            },
            "tool-output-error" => Self::ToolOutputError {
                tool_call_id: str_field("toolCallId")?,
                error_text: str_field("errorText")?,
                provider_executed: opt_bool("providerExecuted"),
            },
            "source-url" => Self::SourceUrl {
                source_id: str_field("sourceId")?,
                url: str_field("url")?,
                title: opt_str("title"),
            },
            "file" => Self::File {
                media_type: str_field("mediaType")?,
                data: str_field("data")?,
            },
            "message-metadata" => Self::MessageMetadata {
                metadata: value_field("messageMetadata"),
            },
            "error" => Self::Error {
                error_text: str_field("errorText")?,
            },
            "abort" => Self::Abort {
                reason: opt_str("reason"),
            },
            "finish" => Self::Finish {
                finish_reason: opt_str("finishReason")
                    .map(|s| parse_finish_reason(&s)),
            },
            other => return Err(format!("unknown chunk type '{other}'")),
        };
        Ok(chunk)
    }
}

impl Serialize for UiMessageChunk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UiMessageChunk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(D::Error::custom)
    }
}

// Streams must be consumable from spawned tasks.
static_assertions::assert_impl_all!(UiMessageStream: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_delta_wire_shape() {
        let chunk = UiMessageChunk::TextDelta {
            id: "txt_0".into(),
            delta: "hello".into(),
        };
        assert_eq!(
            chunk.to_value(),
            json!({ "type": "text-delta", "id": "txt_0", "delta": "hello" })
        );
    }

    #[test]
    fn data_chunk_type_is_literal_data_name() {
        let chunk = UiMessageChunk::Data(DataChunk::new("weather", json!({"temp": 18})));
        let value = chunk.to_value();
        assert_eq!(value["type"], "data-weather");
        assert_eq!(value["data"]["temp"], 18);
        assert!(value.get("transient").is_none());
    }

    #[test]
    fn transient_data_chunk_round_trips() {
        let chunk = UiMessageChunk::Data(DataChunk::new("notice", json!("loading")).transient());
        let value = chunk.to_value();
        assert_eq!(value["transient"], true);
        let parsed = UiMessageChunk::from_value(&value).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn finish_chunk_carries_reason_string() {
        let chunk = UiMessageChunk::Finish {
            finish_reason: Some(FinishReason::ToolCalls),
        };
        assert_eq!(chunk.to_value()["finishReason"], "tool-calls");
    }

    #[test]
    fn chunks_round_trip_through_serde() {
        let chunks = vec![
            UiMessageChunk::Start {
                message_id: Some("msg_1".into()),
            },
            UiMessageChunk::StartStep,
            UiMessageChunk::TextStart { id: "t0".into() },
            UiMessageChunk::TextDelta {
                id: "t0".into(),
                delta: "hi".into(),
            },
            UiMessageChunk::TextEnd { id: "t0".into() },
            UiMessageChunk::ToolInputStart {
                tool_call_id: "call_1".into(),
                tool_name: "weather".into(),
                provider_executed: None,
                dynamic: Some(true),
            },
            UiMessageChunk::ToolInputAvailable {
                tool_call_id: "call_1".into(),
                tool_name: "weather".into(),
                input: json!({"location": "SF"}),
                provider_executed: None,
                dynamic: None,
            },
            UiMessageChunk::ToolOutputAvailable {
                tool_call_id: "call_1".into(),
                output: json!({"temp": 18}),
                provider_executed: None,
            },
            UiMessageChunk::ToolOutputError {
                tool_call_id: "call_1".into(),
                error_text: "boom".into(),
                provider_executed: None,
            },
            UiMessageChunk::SourceUrl {
                source_id: "src_1".into(),
                url: "https://example.com".into(),
                title: None,
            },
            UiMessageChunk::FinishStep,
            UiMessageChunk::Abort { reason: None },
            UiMessageChunk::Finish {
                finish_reason: Some(FinishReason::Stop),
            },
        ];
        for chunk in chunks {
            let text = serde_json::to_string(&chunk).unwrap();
            let parsed: UiMessageChunk = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed, chunk, "round-trip failed for {text}");
        }
    }

    #[test]
    fn unknown_chunk_type_is_rejected() {
        let err = UiMessageChunk::from_value(&json!({"type": "bogus"})).unwrap_err();
        assert!(err.contains("bogus"));
    }

    #[test]
    fn part_ids_scope_framed_chunks() {
        let chunk = UiMessageChunk::TextDelta {
            id: "t0".into(),
            delta: "x".into(),
        };
        assert_eq!(chunk.part_id(), Some("t0"));
        assert_eq!(UiMessageChunk::StartStep.part_id(), None);
    }
}
