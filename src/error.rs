//! Error types for the orchestration core.
//!
//! Tool-level failures (`NoSuchTool`, `InvalidToolInput`, `ToolExecutionFailed`)
//! are recoverable: they are absorbed into tool results so the model can see
//! and react to them in the next step. Adapter, version, and cancellation
//! errors are fatal and abort the step loop.

use thiserror::Error;

/// Errors produced by models, tools, and the step loop.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// A tool call referenced a tool name that is not registered.
    ///
    /// Recoverable: becomes a tool result error and the loop continues.
    #[error("no such tool '{tool_name}' (available: {})", available.join(", "))]
    NoSuchTool {
        /// Name the model asked for.
        tool_name: String,
        /// Names registered for this call.
        available: Vec<String>,
    },

    /// Tool input failed schema validation and repair did not resolve it.
    ///
    /// Recoverable: becomes a tool result error and the loop continues.
    #[error("invalid input for tool '{tool_name}': {reason}")]
    InvalidToolInput {
        tool_name: String,
        /// The raw input text as produced by the model.
        tool_input: String,
        reason: String,
    },

    /// Tool execution returned an error.
    ///
    /// Recoverable: becomes a tool result error carrying the cause.
    #[error("execution of tool '{tool_name}' failed: {reason}")]
    ToolExecutionFailed {
        tool_name: String,
        tool_call_id: String,
        reason: String,
    },

    /// The model adapter reports a specification version this crate does not
    /// implement. Raised before any step executes.
    #[error("model '{model_id}' implements unsupported specification version {version}")]
    UnsupportedModelVersion { model_id: String, version: u32 },

    /// The model produced no usable output.
    #[error("no output generated: {0}")]
    NoOutputGenerated(String),

    /// Transport or adapter failure reported by the provider. Fatal to the loop.
    #[error("provider error: {0}")]
    ProviderError(String),

    /// The operation was cancelled through its cancel handle.
    ///
    /// Fatal but expected; distinguishable from true failure via [`LlmError::is_abort`].
    #[error("operation aborted")]
    Aborted,

    /// JSON or wire-format parsing failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A caller supplied an argument the API cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invariant violation inside the crate.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl LlmError {
    /// Whether this error is absorbed into a tool result instead of
    /// aborting the loop.
    pub fn is_recoverable_tool_error(&self) -> bool {
        matches!(
            self,
            Self::NoSuchTool { .. }
                | Self::InvalidToolInput { .. }
                | Self::ToolExecutionFailed { .. }
        )
    }

    /// Whether this error represents cancellation rather than failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Shorthand constructor for provider failures.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::ProviderError(message.into())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(e.to_string())
    }
}
