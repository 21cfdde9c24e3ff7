//! # Textloom
//!
//! Multi-step LLM generation orchestration for Rust: a step loop that
//! drives repeated model calls until a stop condition fires, a tool call
//! coordinator that validates, repairs, and executes tool invocations, and
//! a streaming translator that re-emits provider deltas as a stable,
//! provider-agnostic UI message stream.
//!
//! Provider adapters are black boxes implementing [`model::LanguageModel`];
//! the core never talks HTTP itself.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use textloom::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = my_provider_adapter();
//!     let weather = Tool::executable(
//!         "weather",
//!         "Get weather for a location",
//!         serde_json::json!({
//!             "type": "object",
//!             "properties": { "location": { "type": "string" } },
//!             "required": ["location"]
//!         }),
//!         |input| async move { Ok(serde_json::json!({ "temperature": 18 })) },
//!     );
//!
//!     let outcome = generate_text(
//!         model.as_ref(),
//!         vec![ModelMessage::user("What's the weather in SF?")],
//!         vec![weather],
//!         GenerateOptions::default(),
//!     )
//!     .await?;
//!
//!     if let Some(result) = outcome.finished() {
//!         println!("{}", result.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! [`ui_stream::stream_text`] runs the same loop but emits
//! [`ui_stream::UiMessageChunk`] events live, one continuous sequence
//! spanning all steps until `finish`. [`ui_stream::sse_lines`] and the
//! optional Axum adapter (feature `server-adapters`) frame the chunks for
//! the wire.

#![deny(unsafe_code)]

pub mod error;
pub mod generate;
pub mod model;
pub mod toolcall;
pub mod types;
pub mod ui_stream;
pub mod utils;
pub mod validation;

/// Convenient re-exports of the public surface.
pub mod prelude {
    pub use crate::error::LlmError;
    pub use crate::generate::{
        GenerateOptions, GenerateOutcome, GenerateTextError, GenerateTextResult,
        PendingToolSession, StepResult, StopCondition, generate_text, resume_text, step_count_is,
    };
    pub use crate::model::{
        CallSettings, GenerateRequest, GenerateResponse, LanguageModel, ModelStream,
        ModelStreamEvent,
    };
    pub use crate::toolcall::{
        RepairContext, RepairOutcome, ToolCallRepairer, ToolRegistry,
    };
    pub use crate::types::{
        ContentPart, FinishReason, MessageRole, ModelMessage, Tool, ToolCall, ToolResult, Usage,
    };
    pub use crate::ui_stream::{
        StreamTextHandle, UiMessageChunk, UiMessageStream, stream_text,
    };
    pub use crate::utils::cancel::CancelHandle;
}
