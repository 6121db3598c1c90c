//! UI messages to provider messages

use super::message::{UiMessage, UiPart, UiRole, UiToolPart};
use crate::llm::{Message, ToolCall};
use crate::tools::ToolResult;

/// Convert the UI history into the provider-neutral form
///
/// Each assistant step becomes one assistant message; a step that called
/// tools is followed by one tool message per finished call. Tool calls still
/// awaiting output are dropped, since providers reject unanswered calls.
pub fn convert_to_model_messages(messages: &[UiMessage]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            UiRole::System => {
                let text = message.text();
                if !text.is_empty() {
                    out.push(Message::system(text));
                }
            }
            UiRole::User => {
                let text = message.text();
                if !text.is_empty() {
                    out.push(Message::user(text));
                }
            }
            UiRole::Assistant => {
                for step in message.parts.split(|p| matches!(p, UiPart::StepStart)) {
                    push_assistant_step(step, &mut out);
                }
            }
        }
    }

    out
}

fn push_assistant_step(step: &[UiPart], out: &mut Vec<Message>) {
    let mut text = String::new();
    let mut finished: Vec<&UiToolPart> = Vec::new();

    for part in step {
        match part {
            UiPart::Text { text: t } => text.push_str(t),
            UiPart::Tool(tool) if tool.state().is_complete() => finished.push(tool),
            UiPart::Tool(tool) => {
                tracing::debug!(
                    "Dropping unfinished tool call {} ({})",
                    tool.tool_call_id,
                    tool.state().as_str()
                );
            }
            UiPart::StepStart | UiPart::Unknown { .. } => {}
        }
    }

    if finished.is_empty() {
        if !text.is_empty() {
            out.push(Message::assistant(text));
        }
        return;
    }

    let calls: Vec<ToolCall> = finished
        .iter()
        .map(|tool| ToolCall {
            id: tool.tool_call_id.clone(),
            name: tool.tool_name.clone(),
            arguments: tool
                .input
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
        })
        .collect();
    out.push(Message::assistant_tool_calls(Some(text), &calls));

    for tool in finished {
        let result = match (tool.output(), tool.error_text()) {
            (Some(output), _) => ToolResult::success(output.clone()),
            (None, Some(error_text)) => ToolResult::error(error_text),
            (None, None) => continue,
        };
        out.push(Message::tool_result(
            tool.tool_call_id.clone(),
            result.to_model_content(),
        ));
    }
}
