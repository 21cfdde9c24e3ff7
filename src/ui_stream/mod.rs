//! UI message stream: chunk protocol, SSE framing, and the stream event
//! translator.

#[cfg(feature = "server-adapters")]
pub mod axum;
mod chunk;
mod sse;
mod translator;

pub use chunk::{DataChunk, UiMessageChunk, UiMessageStream};
pub use sse::{SSE_DONE_FRAME, SseOptions, UI_MESSAGE_STREAM_HEADERS, sse_frame, sse_lines};
pub use translator::{StreamTextHandle, stream_text};
