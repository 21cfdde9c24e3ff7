//! Single-step execution: one model round-trip plus tool resolution.

use futures::future::join_all;

use crate::error::LlmError;
use crate::model::{CallSettings, GenerateRequest, LanguageModel};
use crate::toolcall::{
    ParsedToolCall, ToolCallRepairer, ToolDisposition, ToolRegistry, execute_tool_call,
    parse_tool_call,
};
use crate::types::{
    ContentPart, FinishReason, ModelMessage, ResponseMetadata, ToolCall, ToolResult, Usage,
    Warning,
};
use crate::utils::cancel::CancelHandle;
use crate::utils::id::generate_id;
use crate::validation::SchemaValidator;

/// The outcome of one model round-trip.
///
/// Steps are appended to an ordered history and never mutated after
/// finalization (resuming a suspended loop attaches the supplied results to
/// the suspended step before the next step runs).
#[derive(Debug, Clone)]
pub struct StepResult {
    /// All content parts in the order produced, with locally resolved tool
    /// results appended.
    pub content: Vec<ContentPart>,
    /// Tool calls issued by the model, in issue order (post-repair).
    pub tool_calls: Vec<ToolCall>,
    /// Results attached in call-issue order, regardless of completion order.
    pub tool_results: Vec<ToolResult>,
    /// Calls awaiting out-of-band results (client-side tools).
    pub deferred_tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub warnings: Vec<Warning>,
    pub metadata: ResponseMetadata,
}

impl StepResult {
    /// Concatenated text parts of this step.
    pub fn text(&self) -> String {
        collect_text(&self.content, false)
    }

    /// Concatenated reasoning parts of this step.
    pub fn reasoning_text(&self) -> String {
        collect_text(&self.content, true)
    }

    pub fn has_deferred_tool_calls(&self) -> bool {
        !self.deferred_tool_calls.is_empty()
    }
}

fn collect_text(parts: &[ContentPart], reasoning: bool) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            ContentPart::Text { text } if !reasoning => out.push_str(text),
            ContentPart::Reasoning { text } if reasoning => out.push_str(text),
            _ => {}
        }
    }
    out
}

/// Shared, read-only inputs for step execution.
pub(crate) struct StepInputs<'a> {
    pub model: &'a dyn LanguageModel,
    pub registry: &'a ToolRegistry,
    pub settings: &'a CallSettings,
    pub validator: &'a dyn SchemaValidator,
    pub repairer: Option<&'a dyn ToolCallRepairer>,
    pub cancel: &'a CancelHandle,
}

impl StepInputs<'_> {
    pub(crate) fn request(&self, messages: &[ModelMessage]) -> GenerateRequest {
        GenerateRequest {
            messages: messages.to_vec(),
            tools: self.registry.descriptors(),
            settings: self.settings.clone(),
        }
    }
}

/// Give a provider-omitted call id a synthesized one.
pub(crate) fn ensure_call_id(mut call: ToolCall) -> ToolCall {
    if call.tool_call_id.is_empty() {
        call.tool_call_id = generate_id("call");
    }
    call
}

/// Run one model round-trip and resolve its tool calls.
///
/// The executor is stateless: it does not touch the shared conversation,
/// and adapter errors propagate unmodified. Tool executions for distinct
/// calls run concurrently; results attach in call-issue order.
pub(crate) async fn run_step(
    inputs: &StepInputs<'_>,
    messages: &[ModelMessage],
) -> Result<StepResult, LlmError> {
    if inputs.cancel.is_cancelled() {
        return Err(LlmError::Aborted);
    }

    let request = inputs.request(messages);
    let response = tokio::select! {
        _ = inputs.cancel.cancelled() => return Err(LlmError::Aborted),
        response = inputs.model.do_generate(request) => response?,
    };

    // Parse every tool call (issue order), applying repair where configured.
    let mut content: Vec<ContentPart> = Vec::with_capacity(response.content.len());
    let mut parsed_calls: Vec<ParsedToolCall> = Vec::new();
    let mut provider_results: Vec<ToolResult> = Vec::new();
    for part in response.content {
        match part {
            ContentPart::ToolCall(raw) => {
                let raw = ensure_call_id(raw);
                let parsed = parse_tool_call(
                    &raw,
                    inputs.registry,
                    inputs.validator,
                    inputs.repairer,
                    messages,
                )
                .await;
                // The step records the call as resolved (repair is
                // transparent to downstream consumers).
                content.push(ContentPart::ToolCall(parsed.call.clone()));
                parsed_calls.push(parsed);
            }
            ContentPart::ToolResult(result) => {
                provider_results.push(result.clone());
                content.push(ContentPart::ToolResult(result));
            }
            other => content.push(other),
        }
    }

    if inputs.cancel.is_cancelled() {
        return Err(LlmError::Aborted);
    }

    // Execute concurrently; join_all yields dispositions in issue order.
    let dispositions = tokio::select! {
        _ = inputs.cancel.cancelled() => return Err(LlmError::Aborted),
        dispositions = join_all(
            parsed_calls
                .iter()
                .map(|parsed| execute_tool_call(parsed, inputs.registry, inputs.cancel)),
        ) => dispositions,
    };

    let mut tool_calls = Vec::with_capacity(parsed_calls.len());
    let mut tool_results = Vec::new();
    let mut deferred_tool_calls = Vec::new();
    for (parsed, disposition) in parsed_calls.into_iter().zip(dispositions) {
        tool_calls.push(parsed.call.clone());
        match disposition {
            ToolDisposition::Completed(result) => {
                content.push(ContentPart::ToolResult(result.clone()));
                tool_results.push(result);
            }
            ToolDisposition::Deferred => deferred_tool_calls.push(parsed.call),
            ToolDisposition::ProviderExecuted => {
                if let Some(result) = provider_results
                    .iter()
                    .find(|r| r.tool_call_id == parsed.call.tool_call_id)
                {
                    tool_results.push(result.clone());
                }
            }
        }
    }

    Ok(StepResult {
        content,
        tool_calls,
        tool_results,
        deferred_tool_calls,
        finish_reason: response.finish_reason,
        usage: response.usage,
        warnings: response.warnings,
        metadata: response.metadata,
    })
}
