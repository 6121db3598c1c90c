//! When to resubmit without new user input

use super::message::{UiMessage, UiPart, UiRole};

/// True when the last message is from the assistant and every tool call in
/// its last step has finished, successfully or not.
///
/// A step is the run of parts after the final `step-start` marker. A step
/// without tool calls never triggers a continuation, so a plain text answer
/// ends the exchange.
pub fn last_assistant_message_is_complete_with_tool_calls(messages: &[UiMessage]) -> bool {
    let Some(last) = messages.last() else {
        return false;
    };
    if last.role != UiRole::Assistant {
        return false;
    }

    let step_begin = last
        .parts
        .iter()
        .rposition(|p| matches!(p, UiPart::StepStart))
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut tools = last.parts[step_begin..].iter().filter_map(|p| match p {
        UiPart::Tool(tool) => Some(tool),
        _ => None,
    });

    let mut saw_tool = false;
    let all_complete = tools.all(|tool| {
        saw_tool = true;
        tool.state().is_complete()
    });
    saw_tool && all_complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::message::UiToolPart;
    use serde_json::json;

    fn assistant(parts: Vec<UiPart>) -> UiMessage {
        let mut message = UiMessage::new(UiRole::Assistant);
        message.parts = parts;
        message
    }

    fn finished_tool(id: &str) -> UiPart {
        let mut tool = UiToolPart::new(id, "squareRoot");
        tool.set_input_available(json!({"number": 2, "decimalPlaces": 2}))
            .unwrap();
        tool.set_output(json!({"result": 1.41})).unwrap();
        UiPart::Tool(tool)
    }

    fn failed_tool(id: &str) -> UiPart {
        let mut tool = UiToolPart::new(id, "squareRoot");
        tool.set_error("negative").unwrap();
        UiPart::Tool(tool)
    }

    fn pending_tool(id: &str) -> UiPart {
        UiPart::Tool(UiToolPart::new(id, "squareRoot"))
    }

    fn text(t: &str) -> UiPart {
        UiPart::Text { text: t.into() }
    }

    #[test]
    fn test_empty_and_user_last() {
        assert!(!last_assistant_message_is_complete_with_tool_calls(&[]));
        assert!(!last_assistant_message_is_complete_with_tool_calls(&[
            UiMessage::user_text("hi")
        ]));
    }

    #[test]
    fn test_completed_tools_continue() {
        let messages = vec![
            UiMessage::user_text("sqrt 2"),
            assistant(vec![UiPart::StepStart, finished_tool("a"), failed_tool("b")]),
        ];
        assert!(last_assistant_message_is_complete_with_tool_calls(&messages));
    }

    #[test]
    fn test_pending_tool_blocks() {
        let messages = vec![assistant(vec![
            UiPart::StepStart,
            finished_tool("a"),
            pending_tool("b"),
        ])];
        assert!(!last_assistant_message_is_complete_with_tool_calls(&messages));
    }

    #[test]
    fn test_text_only_answer_does_not_continue() {
        let messages = vec![assistant(vec![UiPart::StepStart, text("hello")])];
        assert!(!last_assistant_message_is_complete_with_tool_calls(&messages));
    }

    #[test]
    fn test_only_last_step_counts() {
        // Tool step answered by a later text step: done
        let messages = vec![assistant(vec![
            UiPart::StepStart,
            finished_tool("a"),
            UiPart::StepStart,
            text("The square root is 1.41."),
        ])];
        assert!(!last_assistant_message_is_complete_with_tool_calls(&messages));

        // Earlier pending tool is outside the last step
        let messages = vec![assistant(vec![
            UiPart::StepStart,
            pending_tool("a"),
            UiPart::StepStart,
            finished_tool("b"),
        ])];
        assert!(last_assistant_message_is_complete_with_tool_calls(&messages));
    }
}
