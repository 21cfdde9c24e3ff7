//! Tool call resolution: parse, repair, execute, normalize.
//!
//! Resolution happens in two phases. [`parse_tool_call`] validates the raw
//! call against the registry and schema, running the one-shot repair
//! protocol on failure; it never returns an error — a terminal failure is
//! captured on the parsed call. [`execute_tool_call`] then turns the parsed
//! call into a disposition: a completed [`ToolResult`] (success or absorbed
//! error), a deferral for client-side tools, or a pass-through for
//! provider-executed tools.

use serde_json::Value;

use crate::error::LlmError;
use crate::types::{ModelMessage, ToolCall, ToolExecutionContext, ToolResult};
use crate::utils::cancel::CancelHandle;
use crate::validation::{SchemaValidator, parse_tool_input};

use super::registry::ToolRegistry;
use super::repair::{RepairContext, RepairOutcome, ToolCallRepairer};

/// A tool call after validation and (possibly) repair.
#[derive(Debug, Clone)]
pub struct ParsedToolCall {
    /// The call as it will be recorded in the step (post-repair if a repair
    /// was applied).
    pub call: ToolCall,
    /// Parsed input value. Best-effort when the call is invalid.
    pub input: Value,
    /// Free-form tool (unregistered provider-executed, or registered as
    /// dynamic).
    pub dynamic: bool,
    /// Terminal parse failure, if resolution failed.
    pub invalid: Option<LlmError>,
}

impl ParsedToolCall {
    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }
}

/// How a parsed tool call was settled.
#[derive(Debug, Clone)]
pub enum ToolDisposition {
    /// A result was produced (successful output or absorbed error).
    Completed(ToolResult),
    /// Client-side tool: no local execute capability, the caller supplies
    /// the result out-of-band before the loop resumes.
    Deferred,
    /// The provider executed the tool itself; its result arrives as
    /// response content.
    ProviderExecuted,
}

fn best_effort_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn do_parse(
    call: &ToolCall,
    registry: &ToolRegistry,
    validator: &dyn SchemaValidator,
) -> Result<ParsedToolCall, LlmError> {
    let Some(tool) = registry.get(&call.tool_name) else {
        // Provider-executed dynamic tools are not part of the registry.
        if call.provider_executed == Some(true) && call.dynamic == Some(true) {
            let input = if call.input.trim().is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&call.input).map_err(|e| LlmError::InvalidToolInput {
                    tool_name: call.tool_name.clone(),
                    tool_input: call.input.clone(),
                    reason: e.to_string(),
                })?
            };
            return Ok(ParsedToolCall {
                call: call.clone(),
                input,
                dynamic: true,
                invalid: None,
            });
        }
        return Err(LlmError::NoSuchTool {
            tool_name: call.tool_name.clone(),
            available: registry.names(),
        });
    };

    let input = parse_tool_input(&call.input, &tool.input_schema, validator).map_err(|reason| {
        LlmError::InvalidToolInput {
            tool_name: call.tool_name.clone(),
            tool_input: call.input.clone(),
            reason,
        }
    })?;

    Ok(ParsedToolCall {
        call: call.clone(),
        input,
        dynamic: tool.dynamic,
        invalid: None,
    })
}

/// Parse a tool call, applying the repair protocol on failure.
///
/// Repair runs at most once: the corrected call is re-parsed and a second
/// failure is terminal. Never returns an error; terminal failures are
/// captured in [`ParsedToolCall::invalid`] so the loop can report them to
/// the model instead of aborting.
pub async fn parse_tool_call(
    call: &ToolCall,
    registry: &ToolRegistry,
    validator: &dyn SchemaValidator,
    repairer: Option<&dyn ToolCallRepairer>,
    messages: &[ModelMessage],
) -> ParsedToolCall {
    let error = match do_parse(call, registry, validator) {
        Ok(parsed) => return parsed,
        Err(error) => error,
    };

    if let Some(repairer) = repairer
        && error.is_recoverable_tool_error()
    {
        let ctx = RepairContext {
            error: &error,
            call,
            registry,
            messages,
        };
        match repairer.repair(ctx).await {
            Ok(RepairOutcome::Repaired(fixed)) => {
                tracing::debug!(
                    tool_name = %call.tool_name,
                    tool_call_id = %call.tool_call_id,
                    "retrying repaired tool call"
                );
                match do_parse(&fixed, registry, validator) {
                    Ok(parsed) => return parsed,
                    Err(second) => {
                        return invalid_call(fixed, second);
                    }
                }
            }
            Ok(RepairOutcome::NoRepair) => {}
            Err(repair_error) => {
                tracing::warn!(
                    tool_name = %call.tool_name,
                    "tool call repair failed: {repair_error}"
                );
            }
        }
    }

    invalid_call(call.clone(), error)
}

fn invalid_call(call: ToolCall, error: LlmError) -> ParsedToolCall {
    let input = best_effort_input(&call.input);
    ParsedToolCall {
        call,
        input,
        dynamic: true,
        invalid: Some(error),
    }
}

/// Settle a parsed tool call.
///
/// Execution failures are caught and absorbed into an error result carrying
/// the cause; they never abort the step loop.
pub async fn execute_tool_call(
    parsed: &ParsedToolCall,
    registry: &ToolRegistry,
    cancel: &CancelHandle,
) -> ToolDisposition {
    let call = &parsed.call;

    if let Some(error) = &parsed.invalid {
        return ToolDisposition::Completed(ToolResult::error(
            &call.tool_call_id,
            &call.tool_name,
            error.to_string(),
        ));
    }

    if call.provider_executed == Some(true) {
        return ToolDisposition::ProviderExecuted;
    }

    let Some(tool) = registry.get(&call.tool_name) else {
        // Unreachable for valid parses; settle defensively as an error result.
        return ToolDisposition::Completed(ToolResult::error(
            &call.tool_call_id,
            &call.tool_name,
            LlmError::NoSuchTool {
                tool_name: call.tool_name.clone(),
                available: registry.names(),
            }
            .to_string(),
        ));
    };

    let Some(execute) = tool.execute.as_ref() else {
        return ToolDisposition::Deferred;
    };

    let ctx = ToolExecutionContext {
        tool_call_id: call.tool_call_id.clone(),
        cancel: cancel.clone(),
    };
    tracing::debug!(
        tool_name = %call.tool_name,
        tool_call_id = %call.tool_call_id,
        "executing tool"
    );
    match execute.execute(parsed.input.clone(), ctx).await {
        Ok(value) => ToolDisposition::Completed(ToolResult::success(
            &call.tool_call_id,
            &call.tool_name,
            value,
        )),
        Err(cause) => {
            let error = LlmError::ToolExecutionFailed {
                tool_name: call.tool_name.clone(),
                tool_call_id: call.tool_call_id.clone(),
                reason: cause.to_string(),
            };
            ToolDisposition::Completed(ToolResult::error(
                &call.tool_call_id,
                &call.tool_name,
                error.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolcall::repair::ToolCallRepairer;
    use crate::types::Tool;
    use crate::validation::JsonSchemaValidator;
    use async_trait::async_trait;
    use serde_json::json;

    fn weather_registry() -> ToolRegistry {
        ToolRegistry::new(vec![Tool::executable(
            "weather",
            "Get weather for a location",
            json!({
                "type": "object",
                "properties": { "location": { "type": "string" } },
                "required": ["location"]
            }),
            |input| async move {
                Ok(json!({
                    "location": input["location"],
                    "temperature": 18
                }))
            },
        )])
    }

    #[tokio::test]
    async fn unknown_tool_becomes_no_such_tool() {
        let registry = weather_registry();
        let call = ToolCall::new("call_1", "foo", "{}");
        let parsed =
            parse_tool_call(&call, &registry, &JsonSchemaValidator, None, &[]).await;
        assert!(matches!(parsed.invalid, Some(LlmError::NoSuchTool { .. })));

        let disposition =
            execute_tool_call(&parsed, &registry, &CancelHandle::default()).await;
        match disposition {
            ToolDisposition::Completed(result) => {
                assert!(result.is_error());
                assert_eq!(result.tool_call_id, "call_1");
            }
            other => panic!("expected completed error result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_input_without_repair_is_terminal() {
        let registry = weather_registry();
        let call = ToolCall::new("call_1", "weather", r#"{"city":"SF"}"#);
        let parsed =
            parse_tool_call(&call, &registry, &JsonSchemaValidator, None, &[]).await;
        assert!(matches!(
            parsed.invalid,
            Some(LlmError::InvalidToolInput { .. })
        ));
    }

    struct RenameKeyRepairer;

    #[async_trait]
    impl ToolCallRepairer for RenameKeyRepairer {
        async fn repair(&self, ctx: RepairContext<'_>) -> Result<RepairOutcome, LlmError> {
            let mut value: serde_json::Value =
                serde_json::from_str(&ctx.call.input).unwrap_or(json!({}));
            if let Some(city) = value.get("city").cloned() {
                value["location"] = city;
                value.as_object_mut().unwrap().remove("city");
            }
            let mut fixed = ctx.call.clone();
            fixed.input = value.to_string();
            Ok(RepairOutcome::Repaired(fixed))
        }
    }

    #[tokio::test]
    async fn repaired_call_is_transparent_downstream() {
        let registry = weather_registry();
        let cancel = CancelHandle::default();

        // Failing call goes through repair.
        let failing = ToolCall::new("call_1", "weather", r#"{"city":"SF"}"#);
        let repaired = parse_tool_call(
            &failing,
            &registry,
            &JsonSchemaValidator,
            Some(&RenameKeyRepairer),
            &[],
        )
        .await;
        assert!(!repaired.is_invalid());

        // Corrected input sent directly.
        let direct = ToolCall::new("call_1", "weather", r#"{"location":"SF"}"#);
        let parsed_direct =
            parse_tool_call(&direct, &registry, &JsonSchemaValidator, None, &[]).await;

        let from_repair = execute_tool_call(&repaired, &registry, &cancel).await;
        let from_direct = execute_tool_call(&parsed_direct, &registry, &cancel).await;
        match (from_repair, from_direct) {
            (ToolDisposition::Completed(a), ToolDisposition::Completed(b)) => {
                assert_eq!(a, b);
            }
            other => panic!("expected completed results, got {other:?}"),
        }
    }

    struct DecliningRepairer;

    #[async_trait]
    impl ToolCallRepairer for DecliningRepairer {
        async fn repair(&self, _ctx: RepairContext<'_>) -> Result<RepairOutcome, LlmError> {
            Ok(RepairOutcome::NoRepair)
        }
    }

    #[tokio::test]
    async fn declined_repair_keeps_original_error() {
        let registry = weather_registry();
        let call = ToolCall::new("call_1", "weather", "{}");
        let parsed = parse_tool_call(
            &call,
            &registry,
            &JsonSchemaValidator,
            Some(&DecliningRepairer),
            &[],
        )
        .await;
        assert!(matches!(
            parsed.invalid,
            Some(LlmError::InvalidToolInput { .. })
        ));
    }

    struct BrokenRepairer;

    #[async_trait]
    impl ToolCallRepairer for BrokenRepairer {
        async fn repair(&self, ctx: RepairContext<'_>) -> Result<RepairOutcome, LlmError> {
            // Returns a call that still fails validation.
            Ok(RepairOutcome::Repaired(ctx.call.clone()))
        }
    }

    #[tokio::test]
    async fn repair_runs_exactly_once() {
        let registry = weather_registry();
        let call = ToolCall::new("call_1", "weather", "{}");
        let parsed = parse_tool_call(
            &call,
            &registry,
            &JsonSchemaValidator,
            Some(&BrokenRepairer),
            &[],
        )
        .await;
        // Second failure is terminal, no recursive repair.
        assert!(parsed.is_invalid());
    }

    #[tokio::test]
    async fn client_side_tool_defers() {
        let registry = ToolRegistry::new(vec![Tool::function(
            "ask_user",
            "Ask the user a question",
            json!({"type":"object"}),
        )]);
        let call = ToolCall::new("call_1", "ask_user", "{}");
        let parsed =
            parse_tool_call(&call, &registry, &JsonSchemaValidator, None, &[]).await;
        let disposition =
            execute_tool_call(&parsed, &registry, &CancelHandle::default()).await;
        assert!(matches!(disposition, ToolDisposition::Deferred));
    }

    #[tokio::test]
    async fn execution_failure_is_absorbed() {
        let registry = ToolRegistry::new(vec![Tool::executable(
            "fails",
            "always fails",
            json!({"type":"object"}),
            |_| async { Err(LlmError::InternalError("socket closed".into())) },
        )]);
        let call = ToolCall::new("call_1", "fails", "{}");
        let parsed =
            parse_tool_call(&call, &registry, &JsonSchemaValidator, None, &[]).await;
        let disposition =
            execute_tool_call(&parsed, &registry, &CancelHandle::default()).await;
        match disposition {
            ToolDisposition::Completed(result) => {
                assert!(result.is_error());
                let text = match &result.output {
                    crate::types::ToolOutput::ErrorText { text } => text.clone(),
                    other => panic!("expected error text, got {other:?}"),
                };
                assert!(text.contains("socket closed"));
            }
            other => panic!("expected completed result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_executed_dynamic_tool_passes_through() {
        let registry = weather_registry();
        let mut call = ToolCall::new("call_1", "web_search", r#"{"query":"rust"}"#);
        call.provider_executed = Some(true);
        call.dynamic = Some(true);
        let parsed =
            parse_tool_call(&call, &registry, &JsonSchemaValidator, None, &[]).await;
        assert!(!parsed.is_invalid());
        assert!(parsed.dynamic);
        let disposition =
            execute_tool_call(&parsed, &registry, &CancelHandle::default()).await;
        assert!(matches!(disposition, ToolDisposition::ProviderExecuted));
    }
}
