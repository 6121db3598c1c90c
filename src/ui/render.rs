//! Part rendering
//!
//! `render_part` decides what a part shows; `Rendered::to_terminal` decides
//! how it looks in a terminal.

use super::message::{ToolState, UiMessage, UiPart, UiToolPart};
use colored::Colorize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Show a line for tool calls that have not finished yet
    pub show_progress: bool,
}

/// What a single part displays
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Nothing,
    Text(String),
    Progress(String),
    ToolOutput(String),
    Error(String),
}

impl Rendered {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Rendered::Nothing)
    }

    /// Plain text, no styling
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Rendered::Nothing => None,
            Rendered::Text(s)
            | Rendered::Progress(s)
            | Rendered::ToolOutput(s)
            | Rendered::Error(s) => Some(s),
        }
    }

    pub fn to_terminal(&self) -> Option<String> {
        match self {
            Rendered::Nothing => None,
            Rendered::Text(s) => Some(s.clone()),
            Rendered::Progress(s) => Some(s.dimmed().to_string()),
            Rendered::ToolOutput(s) => Some(s.cyan().to_string()),
            Rendered::Error(s) => Some(s.red().to_string()),
        }
    }
}

pub fn render_part(part: &UiPart, options: &RenderOptions) -> Rendered {
    match part {
        UiPart::Text { text } => Rendered::Text(text.clone()),
        UiPart::Tool(tool) => render_tool_part(tool, options),
        UiPart::StepStart => Rendered::Nothing,
        UiPart::Unknown { raw, .. } => ["content", "text"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_str))
            .map(|s| Rendered::Text(s.to_string()))
            .unwrap_or(Rendered::Nothing),
    }
}

pub fn render_tool_part(tool: &UiToolPart, options: &RenderOptions) -> Rendered {
    match tool.state() {
        ToolState::InputStreaming | ToolState::InputAvailable if !options.show_progress => {
            Rendered::Nothing
        }
        ToolState::InputStreaming => Rendered::Progress(format!("Calling {}...", tool.tool_name)),
        ToolState::InputAvailable => Rendered::Progress(match &tool.input {
            Some(input) => format!("Running {}({})...", tool.tool_name, input),
            None => format!("Running {}...", tool.tool_name),
        }),
        ToolState::OutputAvailable => match tool.output() {
            Some(output) => Rendered::ToolOutput(describe_output(&tool.tool_name, output)),
            None => Rendered::Nothing,
        },
        ToolState::OutputError => match tool.error_text() {
            Some(error_text) => Rendered::Error(format!("Error: {}", error_text)),
            None => Rendered::Nothing,
        },
    }
}

fn describe_output(tool_name: &str, output: &Value) -> String {
    let label = match tool_name {
        "squareRoot" => "Square root".to_string(),
        other => other.to_string(),
    };
    match output.get("result") {
        Some(result) => format!("{}: {}", label, display_value(result)),
        None => format!("{}: {}", label, output),
    }
}

/// Numbers print the shortest way (`4`, not `4.0`); strings print bare
fn display_value(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Everything visible in a message, in part order
pub fn render_message(message: &UiMessage, options: &RenderOptions) -> Vec<Rendered> {
    message
        .parts
        .iter()
        .map(|p| render_part(p, options))
        .filter(|r| !r.is_nothing())
        .collect()
}

/// Shown when the last submission failed
pub fn render_error_banner(error: &str) -> String {
    format!("Something went wrong: {}", error).red().bold().to_string()
}
