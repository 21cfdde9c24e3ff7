//! Conversation messages and content parts.
//!
//! The step loop controller owns the authoritative message list; messages
//! are immutable once appended and new ones are added between steps.

use serde::{Deserialize, Serialize};

use super::tools::{ToolCall, ToolResult};

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One piece of message or response content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },
    /// Internal reasoning emitted by the model.
    Reasoning { text: String },
    /// A tool invocation issued by the model.
    ToolCall(ToolCall),
    /// The result paired with an earlier tool call.
    ToolResult(ToolResult),
    /// Binary content, base64-encoded.
    File {
        #[serde(rename = "mediaType")]
        media_type: String,
        data: String,
    },
    /// A URL source referenced by the response.
    SourceUrl {
        id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }
}

/// One message in the running conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub parts: Vec<ContentPart>,
}

impl ModelMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            parts: vec![ContentPart::text(text)],
        }
    }

    /// Assistant message built from response content parts.
    pub fn assistant_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: MessageRole::Assistant,
            parts,
        }
    }

    /// Tool-role message carrying results for earlier tool calls.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: MessageRole::Tool,
            parts: results.into_iter().map(ContentPart::ToolResult).collect(),
        }
    }

    /// Concatenated text parts of this message.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }
}
