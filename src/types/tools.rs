//! Tool definitions, calls, and results.
//!
//! A [`Tool`] couples a provider-neutral schema descriptor with an optional
//! local execute capability. Tools without an execute capability are
//! "client-side": the step loop suspends when the model calls one and the
//! caller supplies the result out-of-band (see
//! [`crate::generate::PendingToolSession`]).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;
use crate::utils::cancel::CancelHandle;

/// A tool invocation issued by the model.
///
/// `input` is the raw JSON text exactly as the model produced it; validation
/// and parsing happen in the tool call coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Unique id for this call, provider-issued or synthesized.
    pub tool_call_id: String,
    pub tool_name: String,
    /// Raw JSON arguments text (pre-validation).
    pub input: String,
    /// The tool ran inside the provider, not locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_executed: Option<bool>,
    /// Free-form tool not covered by a registered schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<bool>,
}

impl ToolCall {
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input: input.into(),
            provider_executed: None,
            dynamic: None,
        }
    }
}

/// Outcome value of a resolved tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ToolOutput {
    /// Successful execution output.
    Json { value: Value },
    /// Terminal error, human-readable.
    ErrorText { text: String },
    /// Terminal error carrying a structured payload.
    ErrorJson { value: Value },
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ErrorText { .. } | Self::ErrorJson { .. })
    }

    /// The output as a JSON value, regardless of success or error.
    pub fn as_value(&self) -> Value {
        match self {
            Self::Json { value } | Self::ErrorJson { value } => value.clone(),
            Self::ErrorText { text } => Value::String(text.clone()),
        }
    }
}

/// The result paired with a [`ToolCall`].
///
/// Created exactly once per call, either by local execution or by accepting
/// a provider-executed output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Id of the call this result answers.
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_executed: Option<bool>,
}

impl ToolResult {
    pub fn success(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output: ToolOutput::Json { value },
            provider_executed: None,
        }
    }

    pub fn error(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output: ToolOutput::ErrorText { text: text.into() },
            provider_executed: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.output.is_error()
    }
}

/// Context threaded into tool executions.
#[derive(Debug, Clone)]
pub struct ToolExecutionContext {
    /// Id of the call being executed.
    pub tool_call_id: String,
    /// Abort signal for the surrounding generation; long-running tools
    /// should observe it.
    pub cancel: CancelHandle,
}

/// Execute capability of a tool.
#[async_trait]
pub trait ToolExecute: Send + Sync {
    /// Run the tool with validated input and return its output value.
    async fn execute(&self, input: Value, ctx: ToolExecutionContext) -> Result<Value, LlmError>;
}

/// Adapter so plain async closures can serve as execute capabilities.
struct FnExecute<F>(F);

#[async_trait]
impl<F, Fut> ToolExecute for FnExecute<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, LlmError>> + Send,
{
    async fn execute(&self, input: Value, _ctx: ToolExecutionContext) -> Result<Value, LlmError> {
        (self.0)(input).await
    }
}

/// Provider-neutral description of a tool, as sent with a model request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A tool the model may call.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON-schema input descriptor. Opaque to the core; validated through
    /// the injected [`crate::validation::SchemaValidator`].
    pub input_schema: Value,
    /// Local execute capability. `None` marks a client-side tool whose
    /// result arrives out-of-band.
    pub execute: Option<Arc<dyn ToolExecute>>,
    /// Free-form tool whose input is not tied to a static schema.
    pub dynamic: bool,
}

impl Tool {
    /// Create a client-side tool (no local execute capability).
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            execute: None,
            dynamic: false,
        }
    }

    /// Attach an execute capability.
    pub fn with_execute(mut self, execute: Arc<dyn ToolExecute>) -> Self {
        self.execute = Some(execute);
        self
    }

    /// Create a locally executable tool from an async closure.
    pub fn executable<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, LlmError>> + Send + 'static,
    {
        Self::function(name, description, input_schema).with_execute(Arc::new(FnExecute(f)))
    }

    /// Mark the tool as dynamic (free-form input).
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Whether the tool can run locally.
    pub fn is_executable(&self) -> bool {
        self.execute.is_some()
    }

    /// The provider-neutral descriptor sent with a model request.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("executable", &self.is_executable())
            .field("dynamic", &self.dynamic)
            .finish()
    }
}
