//! UI message stream chunks
//!
//! Each chunk travels as one SSE event, `data: <json>\n\n`, and the stream
//! ends with `data: [DONE]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload that terminates the event stream
pub const DONE_MARKER: &str = "[DONE]";

/// Response header announcing the chunk protocol version
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum UiStreamChunk {
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    FinishStep,
    Finish,
    Error {
        error_text: String,
    },
    /// Chunk types this crate does not act on (reasoning, sources, data parts)
    #[serde(other)]
    Unknown,
}

impl UiStreamChunk {
    /// Parse one SSE data payload; `None` for the terminator
    pub fn from_payload(payload: &str) -> Option<serde_json::Result<Self>> {
        if payload.trim() == DONE_MARKER {
            return None;
        }
        Some(serde_json::from_str(payload))
    }
}
