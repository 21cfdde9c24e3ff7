//! Core data model: messages, tools, usage, and shared metadata.

mod common;
mod message;
mod tools;
mod usage;

pub use common::{FinishReason, ResponseMetadata, Warning};
pub use message::{ContentPart, MessageRole, ModelMessage};
pub use tools::{
    Tool, ToolCall, ToolDescriptor, ToolExecute, ToolExecutionContext, ToolOutput, ToolResult,
};
pub use usage::Usage;
