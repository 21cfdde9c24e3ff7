//! Axum integration for UI message stream responses.
//!
//! Requires the `server-adapters` feature.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};
use futures::StreamExt;

use super::chunk::UiMessageStream;
use super::sse::{SseOptions, UI_MESSAGE_STREAM_HEADERS, sse_lines};

/// Convert a chunk stream into an Axum response with the protocol's fixed
/// headers.
pub fn to_ui_message_response(stream: UiMessageStream, options: SseOptions) -> Response<Body> {
    let frames = sse_lines(stream, options).filter_map(|frame| async move {
        match frame {
            Ok(frame) => Some(Ok::<_, std::convert::Infallible>(frame)),
            Err(error) => {
                tracing::warn!("dropping unserializable chunk: {error}");
                None
            }
        }
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Body::from_stream(frames))
        .expect("static response parts are valid");

    let headers = response.headers_mut();
    for (name, value) in UI_MESSAGE_STREAM_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_stream::UiMessageChunk;
    use futures::stream;

    #[tokio::test]
    async fn response_carries_protocol_headers() {
        let chunks: UiMessageStream = Box::pin(stream::iter(vec![UiMessageChunk::Finish {
            finish_reason: None,
        }]));
        let response = to_ui_message_response(chunks, SseOptions::default());
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream");
        assert_eq!(headers["x-vercel-ai-ui-message-stream"], "v1");
        assert_eq!(headers["x-accel-buffering"], "no");
    }
}
