//! Chat messages as the UI sees them
//!
//! Wire shape matches the UI message format used by the browser shell:
//! `{"id", "role", "parts": [{"type": "text", ...}, {"type": "tool-<name>", ...}]}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Prefix of the `type` tag carried by tool parts
pub const TOOL_PART_PREFIX: &str = "tool-";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiMessage {
    pub id: String,
    pub role: UiRole,
    #[serde(default)]
    pub parts: Vec<UiPart>,
}

impl UiMessage {
    pub fn new(role: UiRole) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            parts: Vec::new(),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        let mut message = Self::new(UiRole::User);
        message.parts.push(UiPart::Text { text: text.into() });
        message
    }

    /// Concatenation of every text part
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                UiPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_part(&self, tool_call_id: &str) -> Option<&UiToolPart> {
        self.parts.iter().find_map(|p| match p {
            UiPart::Tool(tool) if tool.tool_call_id == tool_call_id => Some(tool),
            _ => None,
        })
    }

    pub fn tool_part_mut(&mut self, tool_call_id: &str) -> Option<&mut UiToolPart> {
        self.parts.iter_mut().find_map(|p| match p {
            UiPart::Tool(tool) if tool.tool_call_id == tool_call_id => Some(tool),
            _ => None,
        })
    }
}

/// One discrete piece of a message
#[derive(Debug, Clone, PartialEq)]
pub enum UiPart {
    Text { text: String },
    Tool(UiToolPart),
    /// Boundary between model steps inside one assistant message
    StepStart,
    /// Any other tag, kept verbatim so it survives a round trip
    Unknown { kind: String, raw: Value },
}

impl UiPart {
    /// The wire `type` tag
    pub fn kind(&self) -> String {
        match self {
            UiPart::Text { .. } => "text".to_string(),
            UiPart::Tool(tool) => format!("{}{}", TOOL_PART_PREFIX, tool.tool_name),
            UiPart::StepStart => "step-start".to_string(),
            UiPart::Unknown { kind, .. } => kind.clone(),
        }
    }
}

/// Lifecycle of a tool call, in the only order it may advance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    pub fn is_complete(self) -> bool {
        matches!(self, ToolState::OutputAvailable | ToolState::OutputError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolState::InputStreaming => "input-streaming",
            ToolState::InputAvailable => "input-available",
            ToolState::OutputAvailable => "output-available",
            ToolState::OutputError => "output-error",
        }
    }
}

/// Progress of a tool call; output and error live only in their own state
#[derive(Debug, Clone, PartialEq)]
enum ToolPhase {
    InputStreaming,
    InputAvailable,
    OutputAvailable(Value),
    OutputError(String),
}

#[derive(Debug, Error, PartialEq)]
#[error("tool call {tool_call_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub tool_call_id: String,
    pub from: &'static str,
    pub to: &'static str,
}

/// Record of one tool invocation inside an assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct UiToolPart {
    pub tool_name: String,
    pub tool_call_id: String,
    pub input: Option<Value>,
    /// Raw argument text received so far while input is streaming
    pub input_text: String,
    phase: ToolPhase,
}

impl UiToolPart {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            input: None,
            input_text: String::new(),
            phase: ToolPhase::InputStreaming,
        }
    }

    pub fn state(&self) -> ToolState {
        match self.phase {
            ToolPhase::InputStreaming => ToolState::InputStreaming,
            ToolPhase::InputAvailable => ToolState::InputAvailable,
            ToolPhase::OutputAvailable(_) => ToolState::OutputAvailable,
            ToolPhase::OutputError(_) => ToolState::OutputError,
        }
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.phase {
            ToolPhase::OutputAvailable(output) => Some(output),
            _ => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match &self.phase {
            ToolPhase::OutputError(text) => Some(text),
            _ => None,
        }
    }

    pub fn append_input_text(&mut self, delta: &str) {
        if self.state() == ToolState::InputStreaming {
            self.input_text.push_str(delta);
        }
    }

    pub fn set_input_available(&mut self, input: Value) -> Result<(), TransitionError> {
        self.check_forward(ToolState::InputAvailable)?;
        self.input = Some(input);
        self.phase = ToolPhase::InputAvailable;
        Ok(())
    }

    pub fn set_output(&mut self, output: Value) -> Result<(), TransitionError> {
        self.check_forward(ToolState::OutputAvailable)?;
        self.phase = ToolPhase::OutputAvailable(output);
        Ok(())
    }

    pub fn set_error(&mut self, error_text: impl Into<String>) -> Result<(), TransitionError> {
        self.check_forward(ToolState::OutputError)?;
        self.phase = ToolPhase::OutputError(error_text.into());
        Ok(())
    }

    /// Terminal states are final; everything else may only move forward
    fn check_forward(&self, to: ToolState) -> Result<(), TransitionError> {
        let from = self.state();
        if from.is_complete() || to <= from {
            return Err(TransitionError {
                tool_call_id: self.tool_call_id.clone(),
                from: from.as_str(),
                to: to.as_str(),
            });
        }
        Ok(())
    }
}

impl Serialize for UiPart {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        part_to_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UiPart {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        part_from_value(value).map_err(serde::de::Error::custom)
    }
}

fn part_to_value(part: &UiPart) -> Value {
    match part {
        UiPart::Text { text } => json!({ "type": "text", "text": text }),
        UiPart::StepStart => json!({ "type": "step-start" }),
        UiPart::Unknown { raw, .. } => raw.clone(),
        UiPart::Tool(tool) => {
            let mut obj = Map::new();
            obj.insert("type".into(), Value::String(part.kind()));
            obj.insert("toolCallId".into(), Value::String(tool.tool_call_id.clone()));
            obj.insert("state".into(), Value::String(tool.state().as_str().into()));
            if let Some(input) = &tool.input {
                obj.insert("input".into(), input.clone());
            }
            if let Some(output) = tool.output() {
                obj.insert("output".into(), output.clone());
            }
            if let Some(error_text) = tool.error_text() {
                obj.insert("errorText".into(), Value::String(error_text.to_string()));
            }
            Value::Object(obj)
        }
    }
}

fn part_from_value(value: Value) -> Result<UiPart, String> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or("message part is missing a string `type`")?
        .to_string();

    if kind == "text" {
        let text = value
            .get("text")
            .and_then(Value::as_str)
            .ok_or("text part is missing `text`")?;
        return Ok(UiPart::Text {
            text: text.to_string(),
        });
    }

    if kind == "step-start" {
        return Ok(UiPart::StepStart);
    }

    if let Some(tool_name) = kind.strip_prefix(TOOL_PART_PREFIX) {
        let tool_call_id = value
            .get("toolCallId")
            .and_then(Value::as_str)
            .ok_or("tool part is missing `toolCallId`")?;
        let state: ToolState = value
            .get("state")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| format!("invalid tool state: {}", e))?
            .unwrap_or(ToolState::InputStreaming);

        let mut tool = UiToolPart::new(tool_call_id, tool_name);
        tool.input = value.get("input").cloned().filter(|v| !v.is_null());
        tool.phase = match state {
            ToolState::InputStreaming => ToolPhase::InputStreaming,
            ToolState::InputAvailable => ToolPhase::InputAvailable,
            ToolState::OutputAvailable => ToolPhase::OutputAvailable(
                value
                    .get("output")
                    .cloned()
                    .ok_or("output-available tool part is missing `output`")?,
            ),
            ToolState::OutputError => ToolPhase::OutputError(
                value
                    .get("errorText")
                    .and_then(Value::as_str)
                    .ok_or("output-error tool part is missing `errorText`")?
                    .to_string(),
            ),
        };
        return Ok(UiPart::Tool(tool));
    }

    Ok(UiPart::Unknown { kind, raw: value })
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Chat session id; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub messages: Vec<UiMessage>,
}
