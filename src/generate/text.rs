//! The step loop controller (non-streaming mode).
//!
//! [`generate_text`] drives repeated model calls until a stop condition
//! fires, feeding each step's tool results back as tool-role messages. A
//! step that leaves client-side tool calls unresolved suspends the loop:
//! the caller gets a [`PendingToolSession`] handle and resumes with
//! [`resume_text`] once the missing results are available.

use std::sync::Arc;

use thiserror::Error;

use crate::error::LlmError;
use crate::model::{CallSettings, LanguageModel, ensure_supported_version};
use crate::toolcall::{ToolCallRepairer, ToolRegistry};
use crate::types::{
    ContentPart, FinishReason, ModelMessage, ResponseMetadata, Tool, ToolCall, ToolResult, Usage,
};
use crate::utils::cancel::CancelHandle;
use crate::utils::id::generate_id;
use crate::validation::{JsonSchemaValidator, SchemaValidator};

use super::step::{StepInputs, StepResult, run_step};
use super::stop::{DEFAULT_MAX_STEPS, StopCondition, step_count_is};

/// Options controlling a generation call.
#[derive(Clone)]
pub struct GenerateOptions {
    /// Stop conditions, evaluated in order after each fully resolved step.
    /// The default is a single `step_count_is(DEFAULT_MAX_STEPS)`.
    pub stop_when: Vec<Arc<dyn StopCondition>>,
    pub settings: CallSettings,
    /// Validator for tool inputs.
    pub validator: Arc<dyn SchemaValidator>,
    /// Optional one-shot tool call repair strategy.
    pub repairer: Option<Arc<dyn ToolCallRepairer>>,
    /// Invoked after each step settles.
    pub on_step_finish: Option<Arc<dyn Fn(&StepResult) + Send + Sync>>,
    /// Abort signal observed at every suspend point.
    pub cancel: CancelHandle,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            stop_when: vec![step_count_is(DEFAULT_MAX_STEPS)],
            settings: CallSettings::default(),
            validator: Arc::new(JsonSchemaValidator),
            repairer: None,
            on_step_finish: None,
            cancel: CancelHandle::new(),
        }
    }
}

/// Failure of a generation call, carrying the step history accumulated
/// before the failure for diagnostics.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct GenerateTextError {
    pub error: LlmError,
    pub steps: Vec<StepResult>,
}

impl GenerateTextError {
    fn new(error: LlmError, steps: Vec<StepResult>) -> Self {
        Self { error, steps }
    }
}

/// Aggregated result of a completed generation.
#[derive(Debug, Clone)]
pub struct GenerateTextResult {
    /// Text of the final step.
    pub text: String,
    /// Content parts of the final step.
    pub content: Vec<ContentPart>,
    /// Tool calls of the final step, in issue order.
    pub tool_calls: Vec<ToolCall>,
    /// Tool results of the final step, attached in call-issue order.
    pub tool_results: Vec<ToolResult>,
    pub finish_reason: FinishReason,
    /// Usage merged across every step.
    pub usage: Usage,
    /// Full ordered step history.
    pub steps: Vec<StepResult>,
    /// Provider metadata of the final step.
    pub metadata: ResponseMetadata,
    /// The conversation including the messages appended during the loop.
    pub messages: Vec<ModelMessage>,
}

/// Suspended loop awaiting out-of-band tool results.
///
/// The handle owns everything needed to continue: the conversation so far,
/// the step history, and the calls still missing results. Identity is the
/// generated `session_id`; the handle itself is process-local.
pub struct PendingToolSession {
    pub session_id: String,
    pub steps: Vec<StepResult>,
    /// Calls the caller must answer before resuming.
    pub pending_calls: Vec<ToolCall>,
    messages: Vec<ModelMessage>,
    registry: ToolRegistry,
}

impl std::fmt::Debug for PendingToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingToolSession")
            .field("session_id", &self.session_id)
            .field("pending_calls", &self.pending_calls)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Outcome of one `generate_text`/`resume_text` invocation.
#[derive(Debug)]
pub enum GenerateOutcome {
    /// The loop reached a stop condition.
    Finished(GenerateTextResult),
    /// The loop suspended on client-side tool calls.
    AwaitingToolResults(PendingToolSession),
}

impl GenerateOutcome {
    pub fn finished(self) -> Option<GenerateTextResult> {
        match self {
            Self::Finished(result) => Some(result),
            Self::AwaitingToolResults(_) => None,
        }
    }

    pub fn awaiting_tool_results(self) -> Option<PendingToolSession> {
        match self {
            Self::AwaitingToolResults(session) => Some(session),
            Self::Finished(_) => None,
        }
    }
}

/// Generate text, running the step loop until a stop condition fires.
///
/// Tool-level failures become tool results the model can react to; only
/// adapter, version, and cancellation errors abort the loop.
pub async fn generate_text(
    model: &dyn LanguageModel,
    messages: Vec<ModelMessage>,
    tools: Vec<Tool>,
    options: GenerateOptions,
) -> Result<GenerateOutcome, GenerateTextError> {
    ensure_supported_version(model).map_err(|e| GenerateTextError::new(e, Vec::new()))?;
    let registry = ToolRegistry::new(tools);
    run_loop(model, messages, registry, options, Vec::new()).await
}

/// Resume a loop suspended on deferred tool results.
///
/// Every pending call must be answered by exactly one of `results`
/// (matched by `tool_call_id`); results attach to the suspended step in
/// call-issue order before the next step runs.
pub async fn resume_text(
    model: &dyn LanguageModel,
    session: PendingToolSession,
    results: Vec<ToolResult>,
    options: GenerateOptions,
) -> Result<GenerateOutcome, GenerateTextError> {
    ensure_supported_version(model)
        .map_err(|e| GenerateTextError::new(e, session.steps.clone()))?;

    let PendingToolSession {
        session_id,
        mut steps,
        pending_calls,
        mut messages,
        registry,
    } = session;

    let mut ordered = Vec::with_capacity(pending_calls.len());
    for call in &pending_calls {
        let Some(result) = results
            .iter()
            .find(|r| r.tool_call_id == call.tool_call_id)
        else {
            return Err(GenerateTextError::new(
                LlmError::InvalidArgument(format!(
                    "missing result for pending tool call '{}' in session {session_id}",
                    call.tool_call_id
                )),
                steps,
            ));
        };
        ordered.push(result.clone());
    }

    if let Some(last) = steps.last_mut() {
        for result in &ordered {
            last.content.push(ContentPart::ToolResult(result.clone()));
            last.tool_results.push(result.clone());
        }
        last.deferred_tool_calls.clear();
    }
    messages.push(ModelMessage::tool_results(ordered));

    // The suspended step now counts toward stop conditions.
    if options.stop_when.iter().any(|c| c.should_stop(&steps)) {
        return Ok(finish(steps, messages));
    }

    run_loop(model, messages, registry, options, steps).await
}

async fn run_loop(
    model: &dyn LanguageModel,
    mut messages: Vec<ModelMessage>,
    registry: ToolRegistry,
    options: GenerateOptions,
    mut steps: Vec<StepResult>,
) -> Result<GenerateOutcome, GenerateTextError> {
    loop {
        let inputs = StepInputs {
            model,
            registry: &registry,
            settings: &options.settings,
            validator: options.validator.as_ref(),
            repairer: options.repairer.as_deref(),
            cancel: &options.cancel,
        };
        let step = match run_step(&inputs, &messages).await {
            Ok(step) => step,
            Err(error) => return Err(GenerateTextError::new(error, steps)),
        };

        // The assistant message carries everything except tool results,
        // which go into a tool-role message once resolved.
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

        let deferred = step.deferred_tool_calls.clone();
        // Provider-executed results stay in the assistant message; the tool
        // message carries only locally produced results.
        let tool_results: Vec<ToolResult> = step
            .tool_results
            .iter()
            .filter(|r| r.provider_executed != Some(true))
            .cloned()
            .collect();
        let wants_continuation =
            step.finish_reason == FinishReason::ToolCalls && !step.tool_calls.is_empty();
        steps.push(step);

        if !deferred.is_empty() {
            tracing::debug!(
                pending = deferred.len(),
                "suspending loop for deferred tool results"
            );
            return Ok(GenerateOutcome::AwaitingToolResults(PendingToolSession {
                session_id: generate_id("session"),
                steps,
                pending_calls: deferred,
                messages,
                registry,
            }));
        }

        if !wants_continuation {
            break;
        }
        if options.stop_when.iter().any(|c| c.should_stop(&steps)) {
            tracing::debug!(steps = steps.len(), "stop condition fired");
            break;
        }

        messages.push(ModelMessage::tool_results(tool_results));
    }

    Ok(finish(steps, messages))
}

fn finish(steps: Vec<StepResult>, messages: Vec<ModelMessage>) -> GenerateOutcome {
    let usage = Usage::merge_all(steps.iter().map(|s| &s.usage));
    let last = steps.last().expect("loop ran at least one step").clone();
    GenerateOutcome::Finished(GenerateTextResult {
        text: last.text(),
        content: last.content,
        tool_calls: last.tool_calls,
        tool_results: last.tool_results,
        finish_reason: last.finish_reason,
        usage,
        metadata: last.metadata,
        steps,
        messages,
    })
}
