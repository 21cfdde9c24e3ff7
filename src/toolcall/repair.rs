//! One-shot repair of failed tool calls.
//!
//! When a tool call's name or input fails to resolve, an injected repair
//! strategy gets a single chance to produce a corrected call. The corrected
//! call is re-parsed exactly once; there is no recursive repair.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{ModelMessage, ToolCall};

use super::registry::ToolRegistry;

/// What the repair strategy decided.
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    /// The strategy declined; the original error stands.
    NoRepair,
    /// A corrected call to retry once.
    Repaired(ToolCall),
}

/// Everything a repair strategy may consult.
pub struct RepairContext<'a> {
    /// The error that triggered repair (`NoSuchTool` or `InvalidToolInput`).
    pub error: &'a LlmError,
    /// The failing call as issued by the model.
    pub call: &'a ToolCall,
    /// Tools registered for this generation.
    pub registry: &'a ToolRegistry,
    /// Full message history of the current generation.
    pub messages: &'a [ModelMessage],
}

/// Injectable strategy that may correct a failing tool call.
///
/// Invoked at most once per failing call. A returned error from the strategy
/// itself is logged and treated as a decline.
#[async_trait]
pub trait ToolCallRepairer: Send + Sync {
    async fn repair(&self, ctx: RepairContext<'_>) -> Result<RepairOutcome, LlmError>;
}
