//! Shared test support: scripted models and framing assertions.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use textloom::error::LlmError;
use textloom::model::{
    GenerateRequest, GenerateResponse, LanguageModel, ModelStream, ModelStreamEvent,
};
use textloom::types::{
    ContentPart, FinishReason, ResponseMetadata, ToolCall, Usage,
};
use textloom::ui_stream::UiMessageChunk;

/// Model that replays scripted responses/streams in order.
///
/// `do_generate` and `do_stream` pop from their own scripts; an exhausted
/// script yields a provider error, which doubles as a fault injection for
/// adapter-failure tests.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<Vec<GenerateResponse>>,
    streams: Mutex<Vec<Vec<Result<ModelStreamEvent, LlmError>>>>,
}

impl ScriptedModel {
    pub fn with_responses(responses: Vec<GenerateResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            streams: Mutex::new(Vec::new()),
        }
    }

    pub fn with_streams(streams: Vec<Vec<Result<ModelStreamEvent, LlmError>>>) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            streams: Mutex::new(streams),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> String {
        "scripted-model".to_string()
    }

    fn provider(&self) -> String {
        "test".to_string()
    }

    async fn do_generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let mut script = self.responses.lock().unwrap();
        if script.is_empty() {
            return Err(LlmError::provider("response script exhausted"));
        }
        Ok(script.remove(0))
    }

    async fn do_stream(&self, _request: GenerateRequest) -> Result<ModelStream, LlmError> {
        let mut script = self.streams.lock().unwrap();
        if script.is_empty() {
            return Err(LlmError::provider("stream script exhausted"));
        }
        Ok(Box::pin(stream::iter(script.remove(0))))
    }
}

pub fn usage(input: u64, output: u64) -> Usage {
    Usage {
        input_tokens: Some(input),
        output_tokens: Some(output),
        ..Default::default()
    }
}

pub fn text_response(text: &str, finish_reason: FinishReason, usage: Usage) -> GenerateResponse {
    GenerateResponse {
        content: vec![ContentPart::text(text)],
        finish_reason,
        usage,
        warnings: vec![],
        metadata: ResponseMetadata {
            id: Some("resp_text".into()),
            model_id: Some("scripted-model".into()),
            ..Default::default()
        },
    }
}

pub fn tool_call_response(calls: Vec<ToolCall>, usage: Usage) -> GenerateResponse {
    GenerateResponse {
        content: calls.into_iter().map(ContentPart::ToolCall).collect(),
        finish_reason: FinishReason::ToolCalls,
        usage,
        warnings: vec![],
        metadata: ResponseMetadata {
            id: Some("resp_tools".into()),
            model_id: Some("scripted-model".into()),
            ..Default::default()
        },
    }
}

/// Assert per-part chunk framing over a collected stream:
/// `*-start` precedes every delta for that part id, exactly one terminal
/// chunk follows, and nothing for the part appears after its terminal
/// (tool output chunks follow the input part's terminal by design).
pub fn assert_part_framing(chunks: &[UiMessageChunk]) {
    #[derive(PartialEq)]
    enum PartState {
        Open,
        Closed,
    }
    let mut text_parts: HashMap<String, PartState> = HashMap::new();
    let mut tool_inputs: HashMap<String, PartState> = HashMap::new();
    let mut outputs_seen: HashSet<String> = HashSet::new();

    for chunk in chunks {
        match chunk {
            UiMessageChunk::TextStart { id } | UiMessageChunk::ReasoningStart { id } => {
                assert!(
                    !text_parts.contains_key(id),
                    "part {id} started twice"
                );
                text_parts.insert(id.clone(), PartState::Open);
            }
            UiMessageChunk::TextDelta { id, .. } | UiMessageChunk::ReasoningDelta { id, .. } => {
                assert!(
                    matches!(text_parts.get(id), Some(PartState::Open)),
                    "delta for part {id} outside open window"
                );
            }
            UiMessageChunk::TextEnd { id } | UiMessageChunk::ReasoningEnd { id } => {
                assert!(
                    matches!(text_parts.get(id), Some(PartState::Open)),
                    "terminal for part {id} that is not open"
                );
                text_parts.insert(id.clone(), PartState::Closed);
            }
            UiMessageChunk::ToolInputStart { tool_call_id, .. } => {
                assert!(
                    !tool_inputs.contains_key(tool_call_id),
                    "tool input part {tool_call_id} started twice"
                );
                tool_inputs.insert(tool_call_id.clone(), PartState::Open);
            }
            UiMessageChunk::ToolInputDelta { tool_call_id, .. } => {
                assert!(
                    matches!(tool_inputs.get(tool_call_id), Some(PartState::Open)),
                    "tool input delta for {tool_call_id} outside open window"
                );
            }
            UiMessageChunk::ToolInputAvailable { tool_call_id, .. }
            | UiMessageChunk::ToolInputError { tool_call_id, .. } => {
                // tool-input-start is optional (non-streamed arguments), but
                // the terminal must be unique.
                let prev = tool_inputs.insert(tool_call_id.clone(), PartState::Closed);
                assert!(
                    !matches!(prev, Some(PartState::Closed)),
                    "tool input part {tool_call_id} terminated twice"
                );
            }
            UiMessageChunk::ToolOutputAvailable { tool_call_id, .. }
            | UiMessageChunk::ToolOutputError { tool_call_id, .. } => {
                assert!(
                    outputs_seen.insert(tool_call_id.clone()),
                    "tool output for {tool_call_id} emitted twice"
                );
            }
            _ => {}
        }
    }

    for (id, state) in text_parts {
        assert!(
            state == PartState::Closed,
            "part {id} never received a terminal chunk"
        );
    }
}

/// Wire type identifiers of the collected chunks, for order assertions.
pub fn chunk_types(chunks: &[UiMessageChunk]) -> Vec<String> {
    chunks.iter().map(|c| c.chunk_type()).collect()
}
