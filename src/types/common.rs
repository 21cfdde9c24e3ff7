//! Common enums and metadata types used across the library.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reason why the model stopped generating tokens.
///
/// This enum follows industry conventions (OpenAI, Anthropic, Gemini, etc.):
/// providers report their native reason and the adapter maps it onto one of
/// these variants. `ToolCalls` is the variant that drives step-loop
/// continuation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Model generated a stop sequence or completed naturally.
    Stop,
    /// Model reached the maximum number of output tokens.
    Length,
    /// Content was filtered due to safety/policy violations.
    ContentFilter,
    /// Model triggered tool/function calls.
    ToolCalls,
    /// An error occurred during generation.
    Error,
    /// Other provider-specific finish reason.
    Other(String),
    /// The provider did not report a reason, or it was not recognized.
    Unknown,
}

impl FinishReason {
    /// Stable wire identifier for this reason.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content-filter",
            Self::ToolCalls => "tool-calls",
            Self::Error => "error",
            Self::Other(_) => "other",
            Self::Unknown => "unknown",
        }
    }
}

/// Metadata describing one provider response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Provider-issued response id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model that produced the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Response timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    /// Response headers as reported by the adapter.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// Warning from the model provider.
///
/// Warnings indicate non-fatal issues during generation, such as unsupported
/// settings. The generation continues despite warnings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Warning {
    /// An unsupported setting was provided.
    UnsupportedSetting {
        setting: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    /// An unsupported tool was provided.
    UnsupportedTool {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    /// Other warning types.
    Other { message: String },
}

impl Warning {
    pub fn unsupported_setting(
        setting: impl Into<String>,
        details: Option<impl Into<String>>,
    ) -> Self {
        Self::UnsupportedSetting {
            setting: setting.into(),
            details: details.map(|d| d.into()),
        }
    }

    pub fn unsupported_tool(
        tool_name: impl Into<String>,
        details: Option<impl Into<String>>,
    ) -> Self {
        Self::UnsupportedTool {
            tool_name: tool_name.into(),
            details: details.map(|d| d.into()),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
