//! Stream event translator: provider deltas in, UI message chunks out.
//!
//! [`stream_text`] runs the same step loop as the non-streaming controller,
//! but translates each provider delta into chunks the moment it arrives.
//! Chunks flow through a bounded channel to a single consumer, so a slow
//! reader backpressures the translator instead of letting it run ahead.
//! Tool executions for distinct calls run concurrently with delta
//! consumption; their output chunks are linearized through the same sender,
//! and results still attach to the step in call-issue order.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::FuturesUnordered;
use futures::{FutureExt, Stream, StreamExt, future::BoxFuture};
use tokio::sync::{mpsc, oneshot};

use crate::error::LlmError;
use crate::generate::{GenerateOptions, StepResult, ensure_call_id};
use crate::model::{GenerateRequest, LanguageModel, ModelStreamEvent, ensure_supported_version};
use crate::toolcall::{
    ParsedToolCall, ToolDisposition, ToolRegistry, execute_tool_call, parse_tool_call,
};
use crate::types::{
    ContentPart, FinishReason, ModelMessage, ResponseMetadata, Tool, ToolCall, ToolResult, Usage,
    Warning,
};
use crate::utils::cancel::CancelHandle;
use crate::utils::id::generate_id;

use super::chunk::{UiMessageChunk, UiMessageStream};

/// Bound on how far chunk production may run ahead of the consumer.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Handle to a running streamed generation.
pub struct StreamTextHandle {
    /// The outward chunk sequence, spanning all steps until `finish`.
    pub stream: UiMessageStream,
    /// Abort signal for the whole generation.
    pub cancel: CancelHandle,
    /// Resolves with the full step history once the stream ends.
    pub steps: oneshot::Receiver<Vec<StepResult>>,
}

struct ChunkReceiverStream(mpsc::Receiver<UiMessageChunk>);

impl Stream for ChunkReceiverStream {
    type Item = UiMessageChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx)
    }
}

struct Emitter(mpsc::Sender<UiMessageChunk>);

impl Emitter {
    /// Send one chunk, suspending until the consumer has taken the previous
    /// one. `false` means the consumer is gone and production should stop.
    async fn emit(&self, chunk: UiMessageChunk) -> bool {
        self.0.send(chunk).await.is_ok()
    }
}

/// Content accumulated for one step, in part-open order.
enum PendingPart {
    Text { buf: String },
    Reasoning { buf: String },
    ToolCall { call: ToolCall },
    File { media_type: String, data: String },
    SourceUrl { id: String, url: String, title: Option<String> },
}

/// One streamed tool argument run (`tool-input-start` .. `tool-call`).
struct InputBuilder {
    tool_name: String,
    buf: String,
}

#[derive(Default)]
struct StepStreamState {
    parts: Vec<PendingPart>,
    /// provider text part id -> (stream part id, part index)
    ///
    /// Stream part ids are freshly generated at open, so a provider id
    /// reused after close starts a new part instead of reopening the old
    /// one.
    open_text: HashMap<String, (String, usize)>,
    open_reasoning: HashMap<String, (String, usize)>,
    input_builders: HashMap<String, InputBuilder>,
    tool_calls: Vec<ToolCall>,
    results: Vec<Option<ToolResult>>,
    deferred: Vec<ToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
    warnings: Vec<Warning>,
    metadata: ResponseMetadata,
}

impl StepStreamState {
    fn into_step(mut self) -> StepResult {
        let mut content: Vec<ContentPart> = Vec::with_capacity(self.parts.len());
        for part in self.parts {
            content.push(match part {
                PendingPart::Text { buf } => ContentPart::Text { text: buf },
                PendingPart::Reasoning { buf } => ContentPart::Reasoning { text: buf },
                PendingPart::ToolCall { call } => ContentPart::ToolCall(call),
                PendingPart::File { media_type, data } => ContentPart::File { media_type, data },
                PendingPart::SourceUrl { id, url, title } => {
                    ContentPart::SourceUrl { id, url, title }
                }
            });
        }
        let mut tool_results = Vec::new();
        for result in self.results.drain(..).flatten() {
            content.push(ContentPart::ToolResult(result.clone()));
            tool_results.push(result);
        }
        StepResult {
            content,
            tool_calls: self.tool_calls,
            tool_results,
            deferred_tool_calls: self.deferred,
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Unknown),
            usage: self.usage,
            warnings: self.warnings,
            metadata: self.metadata,
        }
    }
}

type ToolFuture = BoxFuture<'static, (usize, ParsedToolCall, ToolDisposition)>;

/// Stream a generation as a UI message stream.
///
/// The version check runs before any step; afterwards all failures surface
/// in-band as a terminal `error` chunk and the stream ends.
pub async fn stream_text(
    model: Arc<dyn LanguageModel>,
    messages: Vec<ModelMessage>,
    tools: Vec<Tool>,
    options: GenerateOptions,
) -> Result<StreamTextHandle, LlmError> {
    ensure_supported_version(model.as_ref())?;

    let registry = ToolRegistry::new(tools);
    let cancel = options.cancel.clone();
    let (tx, rx) = mpsc::channel::<UiMessageChunk>(CHUNK_CHANNEL_CAPACITY);
    let (steps_tx, steps_rx) = oneshot::channel();

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        let steps = translate(model, messages, registry, options, Emitter(tx), task_cancel).await;
        let _ = steps_tx.send(steps);
    });

    Ok(StreamTextHandle {
        stream: Box::pin(ChunkReceiverStream(rx)),
        cancel,
        steps: steps_rx,
    })
}

async fn translate(
    model: Arc<dyn LanguageModel>,
    mut messages: Vec<ModelMessage>,
    registry: ToolRegistry,
    options: GenerateOptions,
    em: Emitter,
    cancel: CancelHandle,
) -> Vec<StepResult> {
    let mut steps: Vec<StepResult> = Vec::new();
    let mut aborted = false;
    let mut failed = false;
    // Tool-call ids settled in earlier steps; a provider repeating an id
    // must not trigger a second execution.
    let mut seen_call_ids: HashSet<String> = HashSet::new();

    if !em
        .emit(UiMessageChunk::Start {
            message_id: Some(generate_id("msg")),
        })
        .await
    {
        return steps;
    }

    'steps: loop {
        if !em.emit(UiMessageChunk::StartStep).await {
            return steps;
        }

        let request = GenerateRequest {
            messages: messages.clone(),
            tools: registry.descriptors(),
            settings: options.settings.clone(),
        };
        let mut provider = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                aborted = true;
                break 'steps;
            }
            result = model.do_stream(request) => match result {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!("streaming model call failed: {error}");
                    failed = true;
                    if !em.emit(UiMessageChunk::Error { error_text: error.to_string() }).await {
                        return steps;
                    }
                    break 'steps;
                }
            },
        };

        let mut state = StepStreamState::default();
        let mut tool_futs: FuturesUnordered<ToolFuture> = FuturesUnordered::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    aborted = true;
                    break 'steps;
                }
                Some((idx, parsed, disposition)) = tool_futs.next(), if !tool_futs.is_empty() => {
                    if !settle_tool(&em, &mut state, idx, &parsed, disposition).await {
                        return steps;
                    }
                }
                event = provider.next() => {
                    let Some(event) = event else { break };
                    let event = match event {
                        Ok(event) => event,
                        Err(error) => {
                            tracing::warn!("provider stream failed: {error}");
                            failed = true;
                            if !em.emit(UiMessageChunk::Error { error_text: error.to_string() }).await {
                                return steps;
                            }
                            break 'steps;
                        }
                    };
                    if let ModelStreamEvent::Error { message } = event {
                        failed = true;
                        if !em.emit(UiMessageChunk::Error { error_text: message }).await {
                            return steps;
                        }
                        break 'steps;
                    }
                    if !handle_event(
                        &em,
                        &mut state,
                        &mut tool_futs,
                        &mut seen_call_ids,
                        event,
                        &registry,
                        &options,
                        &messages,
                        &cancel,
                    )
                    .await
                    {
                        return steps;
                    }
                }
            }
        }

        // Provider stream is done; drain the tool executions still in flight.
        while !tool_futs.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    aborted = true;
                    break 'steps;
                }
                Some((idx, parsed, disposition)) = tool_futs.next() => {
                    if !settle_tool(&em, &mut state, idx, &parsed, disposition).await {
                        return steps;
                    }
                }
            }
        }

        // Close any part the provider left open, so every opened part id
        // gets its terminal chunk.
        let dangling_text: Vec<(String, String)> = state
            .open_text
            .drain()
            .map(|(provider_id, (stream_id, _))| (provider_id, stream_id))
            .collect();
        for (provider_id, stream_id) in dangling_text {
            tracing::warn!(%provider_id, "text part left open by provider");
            if !em.emit(UiMessageChunk::TextEnd { id: stream_id }).await {
                return steps;
            }
        }
        let dangling_reasoning: Vec<(String, String)> = state
            .open_reasoning
            .drain()
            .map(|(provider_id, (stream_id, _))| (provider_id, stream_id))
            .collect();
        for (provider_id, stream_id) in dangling_reasoning {
            tracing::warn!(%provider_id, "reasoning part left open by provider");
            if !em.emit(UiMessageChunk::ReasoningEnd { id: stream_id }).await {
                return steps;
            }
        }
        for (id, builder) in state.input_builders.drain() {
            tracing::warn!(tool_call_id = %id, tool_name = %builder.tool_name,
                buffered = builder.buf.len(), "tool input part never completed");
        }

        let step = state.into_step();
        if !em.emit(UiMessageChunk::FinishStep).await {
            return steps;
        }

        let assistant_parts: Vec<ContentPart> = step
            .content
            .iter()
            .filter(|p| !matches!(p, ContentPart::ToolResult(r) if r.provider_executed != Some(true)))
            .cloned()
            .collect();
        messages.push(ModelMessage::assistant_parts(assistant_parts));

        if let Some(cb) = &options.on_step_finish {
            cb(&step);
        }

        let deferred = !step.deferred_tool_calls.is_empty();
        let continuation_results: Vec<ToolResult> = step
            .tool_results
            .iter()
            .filter(|r| r.provider_executed != Some(true))
            .cloned()
            .collect();
        let wants_continuation =
            step.finish_reason == FinishReason::ToolCalls && !step.tool_calls.is_empty();
        steps.push(step);

        if deferred || !wants_continuation {
            break;
        }
        if options.stop_when.iter().any(|c| c.should_stop(&steps)) {
            tracing::debug!(steps = steps.len(), "stop condition fired");
            break;
        }
        messages.push(ModelMessage::tool_results(continuation_results));
    }

    if aborted {
        tracing::debug!("stream aborted");
        let _ = em
            .emit(UiMessageChunk::Error {
                error_text: LlmError::Aborted.to_string(),
            })
            .await;
    } else if !failed {
        let finish_reason = steps.last().map(|s| s.finish_reason.clone());
        let _ = em.emit(UiMessageChunk::Finish { finish_reason }).await;
    }

    steps
}

/// Translate one provider event into chunks and state updates.
/// Returns `false` when the consumer is gone.
#[allow(clippy::too_many_arguments)]
async fn handle_event(
    em: &Emitter,
    state: &mut StepStreamState,
    tool_futs: &mut FuturesUnordered<ToolFuture>,
    seen_call_ids: &mut HashSet<String>,
    event: ModelStreamEvent,
    registry: &ToolRegistry,
    options: &GenerateOptions,
    messages: &[ModelMessage],
    cancel: &CancelHandle,
) -> bool {
    match event {
        ModelStreamEvent::StreamStart { warnings } => {
            state.warnings.extend(warnings);
            true
        }
        ModelStreamEvent::TextStart { id } => open_text(em, state, &id, false).await,
        ModelStreamEvent::TextDelta { id, delta } => {
            // Start must precede the first delta; open implicitly if needed.
            if !state.open_text.contains_key(&id) && !open_text(em, state, &id, true).await {
                return false;
            }
            let Some((stream_id, idx)) = state.open_text.get(&id) else {
                return true; // part was closed; drop the late delta
            };
            if let PendingPart::Text { buf } = &mut state.parts[*idx] {
                buf.push_str(&delta);
            }
            em.emit(UiMessageChunk::TextDelta {
                id: stream_id.clone(),
                delta,
            })
            .await
        }
        ModelStreamEvent::TextEnd { id } => {
            let Some((stream_id, _)) = state.open_text.remove(&id) else {
                return true;
            };
            em.emit(UiMessageChunk::TextEnd { id: stream_id }).await
        }
        ModelStreamEvent::ReasoningStart { id } => open_reasoning(em, state, &id, false).await,
        ModelStreamEvent::ReasoningDelta { id, delta } => {
            if !state.open_reasoning.contains_key(&id)
                && !open_reasoning(em, state, &id, true).await
            {
                return false;
            }
            let Some((stream_id, idx)) = state.open_reasoning.get(&id) else {
                return true;
            };
            if let PendingPart::Reasoning { buf } = &mut state.parts[*idx] {
                buf.push_str(&delta);
            }
            em.emit(UiMessageChunk::ReasoningDelta {
                id: stream_id.clone(),
                delta,
            })
            .await
        }
        ModelStreamEvent::ReasoningEnd { id } => {
            let Some((stream_id, _)) = state.open_reasoning.remove(&id) else {
                return true;
            };
            em.emit(UiMessageChunk::ReasoningEnd { id: stream_id })
                .await
        }
        ModelStreamEvent::ToolInputStart {
            id,
            tool_name,
            provider_executed,
        } => {
            state.input_builders.insert(
                id.clone(),
                InputBuilder {
                    tool_name: tool_name.clone(),
                    buf: String::new(),
                },
            );
            em.emit(UiMessageChunk::ToolInputStart {
                tool_call_id: id,
                tool_name,
                provider_executed,
                dynamic: None,
            })
            .await
        }
        ModelStreamEvent::ToolInputDelta { id, delta } => {
            if let Some(builder) = state.input_builders.get_mut(&id) {
                builder.buf.push_str(&delta);
            }
            em.emit(UiMessageChunk::ToolInputDelta {
                tool_call_id: id,
                input_text_delta: delta,
            })
            .await
        }
        ModelStreamEvent::ToolCall(call) => {
            let call = ensure_call_id(call);
            state.input_builders.remove(&call.tool_call_id);
            if !seen_call_ids.insert(call.tool_call_id.clone()) {
                tracing::warn!(tool_call_id = %call.tool_call_id, "duplicate tool call id, skipping");
                return true;
            }

            let parsed = parse_tool_call(
                &call,
                registry,
                options.validator.as_ref(),
                options.repairer.as_deref(),
                messages,
            )
            .await;

            let idx = state.tool_calls.len();
            state.tool_calls.push(parsed.call.clone());
            state.results.push(None);
            state.parts.push(PendingPart::ToolCall {
                call: parsed.call.clone(),
            });

            if let Some(error) = &parsed.invalid {
                // Terminal chunk of the input part; the error is still
                // recorded as a result so the model can react next step.
                let ok = em
                    .emit(UiMessageChunk::ToolInputError {
                        tool_call_id: parsed.call.tool_call_id.clone(),
                        tool_name: parsed.call.tool_name.clone(),
                        input: parsed.input.clone(),
                        error_text: error.to_string(),
                    })
                    .await;
                state.results[idx] = Some(ToolResult::error(
                    &parsed.call.tool_call_id,
                    &parsed.call.tool_name,
                    error.to_string(),
                ));
                return ok;
            }

            let ok = em
                .emit(UiMessageChunk::ToolInputAvailable {
                    tool_call_id: parsed.call.tool_call_id.clone(),
                    tool_name: parsed.call.tool_name.clone(),
                    input: parsed.input.clone(),
                    provider_executed: parsed.call.provider_executed,
                    dynamic: parsed.dynamic.then_some(true),
                })
                .await;
            if !ok {
                return false;
            }

            if parsed.call.provider_executed == Some(true) {
                // Output arrives as a provider ToolResult event.
                return true;
            }
            match registry.get(&parsed.call.tool_name) {
                Some(tool) if tool.is_executable() => {
                    let registry = registry.clone();
                    let cancel = cancel.clone();
                    tool_futs.push(
                        async move {
                            let disposition =
                                execute_tool_call(&parsed, &registry, &cancel).await;
                            (idx, parsed, disposition)
                        }
                        .boxed(),
                    );
                }
                _ => {
                    // Client-side tool: leave the call unpaired for the
                    // caller to answer out-of-band.
                    state.deferred.push(parsed.call.clone());
                }
            }
            true
        }
        ModelStreamEvent::ToolResult(result) => {
            // Provider-executed output: report it without local execution.
            let ok = if result.is_error() {
                em.emit(UiMessageChunk::ToolOutputError {
                    tool_call_id: result.tool_call_id.clone(),
                    error_text: match &result.output {
                        crate::types::ToolOutput::ErrorText { text } => text.clone(),
                        other => other.as_value().to_string(),
                    },
                    provider_executed: Some(true),
                })
                .await
            } else {
                em.emit(UiMessageChunk::ToolOutputAvailable {
                    tool_call_id: result.tool_call_id.clone(),
                    output: result.output.as_value(),
                    provider_executed: Some(true),
                })
                .await
            };
            if let Some(idx) = state
                .tool_calls
                .iter()
                .position(|c| c.tool_call_id == result.tool_call_id)
            {
                let mut result = result;
                result.provider_executed = Some(true);
                state.results[idx] = Some(result);
            } else {
                tracing::warn!(tool_call_id = %result.tool_call_id,
                    "provider tool result without matching call");
            }
            ok
        }
        ModelStreamEvent::File { media_type, data } => {
            state.parts.push(PendingPart::File {
                media_type: media_type.clone(),
                data: data.clone(),
            });
            em.emit(UiMessageChunk::File { media_type, data }).await
        }
        ModelStreamEvent::SourceUrl { id, url, title } => {
            state.parts.push(PendingPart::SourceUrl {
                id: id.clone(),
                url: url.clone(),
                title: title.clone(),
            });
            em.emit(UiMessageChunk::SourceUrl {
                source_id: id,
                url,
                title,
            })
            .await
        }
        ModelStreamEvent::ResponseMetadata(metadata) => {
            state.metadata = metadata;
            true
        }
        ModelStreamEvent::Finish {
            finish_reason,
            usage,
        } => {
            state.finish_reason = Some(finish_reason);
            state.usage = usage;
            true
        }
        // Handled by the caller before dispatch.
        ModelStreamEvent::Error { .. } => true,
    }
}

async fn open_text(
    em: &Emitter,
    state: &mut StepStreamState,
    provider_id: &str,
    implicit: bool,
) -> bool {
    if state.open_text.contains_key(provider_id) {
        return true;
    }
    if implicit {
        tracing::warn!(%provider_id, "text delta without start, opening part implicitly");
    }
    let stream_id = generate_id("txt");
    let idx = state.parts.len();
    state.parts.push(PendingPart::Text { buf: String::new() });
    state
        .open_text
        .insert(provider_id.to_string(), (stream_id.clone(), idx));
    em.emit(UiMessageChunk::TextStart { id: stream_id }).await
}

async fn open_reasoning(
    em: &Emitter,
    state: &mut StepStreamState,
    provider_id: &str,
    implicit: bool,
) -> bool {
    if state.open_reasoning.contains_key(provider_id) {
        return true;
    }
    if implicit {
        tracing::warn!(%provider_id, "reasoning delta without start, opening part implicitly");
    }
    let stream_id = generate_id("rsn");
    let idx = state.parts.len();
    state.parts.push(PendingPart::Reasoning { buf: String::new() });
    state
        .open_reasoning
        .insert(provider_id.to_string(), (stream_id.clone(), idx));
    em.emit(UiMessageChunk::ReasoningStart { id: stream_id })
        .await
}

/// Record a settled local tool execution and emit its output chunk.
async fn settle_tool(
    em: &Emitter,
    state: &mut StepStreamState,
    idx: usize,
    parsed: &ParsedToolCall,
    disposition: ToolDisposition,
) -> bool {
    match disposition {
        ToolDisposition::Completed(result) => {
            let ok = if result.is_error() {
                em.emit(UiMessageChunk::ToolOutputError {
                    tool_call_id: result.tool_call_id.clone(),
                    error_text: match &result.output {
                        crate::types::ToolOutput::ErrorText { text } => text.clone(),
                        other => other.as_value().to_string(),
                    },
                    provider_executed: None,
                })
                .await
            } else {
                em.emit(UiMessageChunk::ToolOutputAvailable {
                    tool_call_id: result.tool_call_id.clone(),
                    output: result.output.as_value(),
                    provider_executed: None,
                })
                .await
            };
            state.results[idx] = Some(result);
            ok
        }
        ToolDisposition::Deferred => {
            state.deferred.push(parsed.call.clone());
            true
        }
        ToolDisposition::ProviderExecuted => true,
    }
}
