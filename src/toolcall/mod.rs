//! Tool call coordination: registry, one-shot repair, and resolution.

mod registry;
mod repair;
mod resolve;

pub use registry::ToolRegistry;
pub use repair::{RepairContext, RepairOutcome, ToolCallRepairer};
pub use resolve::{ParsedToolCall, ToolDisposition, execute_tool_call, parse_tool_call};
