//! Model adapter contract.
//!
//! A provider adapter is a black box implementing [`LanguageModel`]: it maps
//! the provider-neutral request onto its own HTTP/wire protocol and reports
//! content back either as a complete response (`do_generate`) or as a stream
//! of [`ModelStreamEvent`] deltas (`do_stream`). The orchestration core never
//! inspects adapter internals; compatibility is negotiated through an
//! explicit specification version tag checked before any step executes.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::types::{
    ContentPart, FinishReason, ModelMessage, ResponseMetadata, ToolCall, ToolDescriptor,
    ToolResult, Usage, Warning,
};

/// Specification version this crate implements.
pub const MODEL_SPEC_VERSION: u32 = 2;

/// Sampling and limit settings forwarded to the adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

/// One model invocation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDescriptor>,
    pub settings: CallSettings,
}

/// Complete (non-streaming) model response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Content parts in the order the model produced them.
    pub content: Vec<ContentPart>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub warnings: Vec<Warning>,
    pub metadata: ResponseMetadata,
}

/// Incremental delta from a streaming model invocation.
///
/// Part ids scope contiguous runs: a `TextStart { id }` opens a text part
/// and every `TextDelta`/`TextEnd` with the same id belongs to it. Adapters
/// must not reuse an id after closing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModelStreamEvent {
    /// First event of a stream; carries adapter warnings.
    StreamStart { warnings: Vec<Warning> },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    /// A tool call began streaming its arguments.
    ToolInputStart {
        id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "providerExecuted")]
        provider_executed: Option<bool>,
    },
    /// Incremental raw argument text for an open tool call.
    ToolInputDelta {
        id: String,
        delta: String,
    },
    /// A tool call's arguments are complete.
    ToolCall(ToolCall),
    /// Output of a tool the provider executed itself.
    ToolResult(ToolResult),
    File {
        #[serde(rename = "mediaType")]
        media_type: String,
        data: String,
    },
    SourceUrl {
        id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    ResponseMetadata(ResponseMetadata),
    /// Terminal event of a successful stream.
    Finish {
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// Terminal event of a failed stream.
    Error { message: String },
}

/// Stream of provider deltas.
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelStreamEvent, LlmError>> + Send>>;

/// Capability interface every provider adapter implements.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier of the underlying model (e.g. `gpt-4o`).
    fn model_id(&self) -> String;

    /// Provider name for diagnostics.
    fn provider(&self) -> String {
        "unknown".to_string()
    }

    /// Specification version the adapter implements. Checked against
    /// [`MODEL_SPEC_VERSION`] before any step executes.
    fn spec_version(&self) -> u32 {
        MODEL_SPEC_VERSION
    }

    /// URL patterns the model accepts natively per media type, keyed by
    /// media-type prefix. Empty means no native URL support.
    fn supported_urls(&self) -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    /// Perform one complete model invocation.
    async fn do_generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;

    /// Perform one streaming model invocation.
    async fn do_stream(&self, request: GenerateRequest) -> Result<ModelStream, LlmError>;
}

/// Reject adapters built against another specification version.
pub(crate) fn ensure_supported_version(model: &dyn LanguageModel) -> Result<(), LlmError> {
    let version = model.spec_version();
    if version != MODEL_SPEC_VERSION {
        return Err(LlmError::UnsupportedModelVersion {
            model_id: model.model_id(),
            version,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VersionedModel(u32);

    #[async_trait]
    impl LanguageModel for VersionedModel {
        fn model_id(&self) -> String {
            "test-model".to_string()
        }

        fn spec_version(&self) -> u32 {
            self.0
        }

        async fn do_generate(
            &self,
            _request: GenerateRequest,
        ) -> Result<GenerateResponse, LlmError> {
            Err(LlmError::InternalError("not used".into()))
        }

        async fn do_stream(&self, _request: GenerateRequest) -> Result<ModelStream, LlmError> {
            Err(LlmError::InternalError("not used".into()))
        }
    }

    #[test]
    fn version_check_accepts_current_spec() {
        assert!(ensure_supported_version(&VersionedModel(MODEL_SPEC_VERSION)).is_ok());
    }

    #[test]
    fn version_check_rejects_other_specs() {
        let err = ensure_supported_version(&VersionedModel(1)).unwrap_err();
        assert!(matches!(
            err,
            LlmError::UnsupportedModelVersion { version: 1, .. }
        ));
    }

    #[test]
    fn stream_event_serializes_with_type_tag() {
        let ev = ModelStreamEvent::TextDelta {
            id: "0".into(),
            delta: "hello".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "text-delta");
        assert_eq!(json["delta"], "hello");
    }
}
