//! SSE framing for the UI message stream.
//!
//! Each event's `data:` payload is one JSON-encoded chunk. The response
//! headers are fixed by the protocol; [`UI_MESSAGE_STREAM_HEADERS`] is the
//! canonical set for any HTTP framework.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::error::LlmError;

use super::chunk::{UiMessageChunk, UiMessageStream};

/// Fixed response headers for a UI message stream response.
pub const UI_MESSAGE_STREAM_HEADERS: [(&str, &str); 5] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache"),
    ("connection", "keep-alive"),
    ("x-vercel-ai-ui-message-stream", "v1"),
    ("x-accel-buffering", "no"),
];

/// Sentinel frame closing the event stream.
pub const SSE_DONE_FRAME: &str = "data: [DONE]\n\n";

/// Options for SSE encoding.
#[derive(Debug, Clone)]
pub struct SseOptions {
    /// Emit the `[DONE]` sentinel after the last chunk.
    pub include_done: bool,
    /// Replace error chunk text with a masked message. Recommended in
    /// production to avoid leaking internals.
    pub mask_errors: bool,
    /// Message used when `mask_errors` is set; defaults to "internal error".
    pub masked_error_message: Option<String>,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            include_done: true,
            mask_errors: false,
            masked_error_message: None,
        }
    }
}

/// Encode one chunk as an SSE `data: ...\n\n` frame.
pub fn sse_frame(chunk: &UiMessageChunk) -> Result<String, LlmError> {
    let json = serde_json::to_string(chunk)
        .map_err(|e| LlmError::ParseError(format!("failed to serialize chunk: {e}")))?;
    Ok(format!("data: {json}\n\n"))
}

/// Convert a chunk stream into a stream of SSE frames.
pub fn sse_lines(
    mut stream: UiMessageStream,
    options: SseOptions,
) -> Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>> {
    let s = async_stream::try_stream! {
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                UiMessageChunk::Error { .. } if options.mask_errors => UiMessageChunk::Error {
                    error_text: options
                        .masked_error_message
                        .clone()
                        .unwrap_or_else(|| "internal error".to_string()),
                },
                other => other,
            };
            yield sse_frame(&chunk)?;
        }
        if options.include_done {
            yield SSE_DONE_FRAME.to_string();
        }
    };
    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn headers_match_protocol() {
        let headers: std::collections::HashMap<_, _> =
            UI_MESSAGE_STREAM_HEADERS.into_iter().collect();
        assert_eq!(headers["content-type"], "text/event-stream");
        assert_eq!(headers["cache-control"], "no-cache");
        assert_eq!(headers["connection"], "keep-alive");
        assert_eq!(headers["x-vercel-ai-ui-message-stream"], "v1");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[test]
    fn frame_wraps_json_payload() {
        let frame = sse_frame(&UiMessageChunk::TextStart { id: "t0".into() }).unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains(r#""type":"text-start""#));
    }

    #[tokio::test]
    async fn lines_end_with_done_sentinel() {
        let chunks: UiMessageStream = Box::pin(stream::iter(vec![
            UiMessageChunk::Start { message_id: None },
            UiMessageChunk::Finish {
                finish_reason: None,
            },
        ]));
        let frames: Vec<_> = sse_lines(chunks, SseOptions::default())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].as_ref().unwrap(), SSE_DONE_FRAME);
    }

    #[tokio::test]
    async fn error_masking_replaces_text() {
        let chunks: UiMessageStream = Box::pin(stream::iter(vec![UiMessageChunk::Error {
            error_text: "secret detail".into(),
        }]));
        let options = SseOptions {
            mask_errors: true,
            include_done: false,
            ..Default::default()
        };
        let frames: Vec<_> = sse_lines(chunks, options).collect::<Vec<_>>().await;
        let frame = frames[0].as_ref().unwrap();
        assert!(!frame.contains("secret detail"));
        assert!(frame.contains("internal error"));
    }
}
