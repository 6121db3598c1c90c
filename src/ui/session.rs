//! Chat state owned by one front-end

use super::continuation::last_assistant_message_is_complete_with_tool_calls;
use super::message::{ChatRequest, UiMessage, UiPart, UiRole, UiToolPart};
use super::stream::UiStreamChunk;
use std::collections::HashMap;

/// Where chunks of the current response land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Create an assistant message on the first chunk
    NewMessage,
    /// Append to the message at this index (continuations)
    Existing(usize),
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    id: String,
    messages: Vec<UiMessage>,
    draft_input: String,
    is_submitting: bool,
    last_error: Option<String>,
    target: Target,
    /// text-start id -> part index inside the target message
    open_text: HashMap<String, usize>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            messages: Vec::new(),
            draft_input: String::new(),
            is_submitting: false,
            last_error: None,
            target: Target::NewMessage,
            open_text: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[UiMessage] {
        &self.messages
    }

    pub fn draft_input(&self) -> &str {
        &self.draft_input
    }

    pub fn set_draft_input(&mut self, text: impl Into<String>) {
        self.draft_input = text.into();
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Submit the current draft
    pub fn submit_draft(&mut self) -> Option<ChatRequest> {
        let text = self.draft_input.clone();
        self.submit(&text)
    }

    /// Append a user message and return the request to send
    ///
    /// Returns `None` without touching any state when `text` is blank or a
    /// response is still streaming.
    pub fn submit(&mut self, text: &str) -> Option<ChatRequest> {
        if self.is_submitting || text.trim().is_empty() {
            return None;
        }

        self.messages.push(UiMessage::user_text(text));
        self.draft_input.clear();
        self.last_error = None;
        self.begin(Target::NewMessage);
        Some(self.request())
    }

    /// Request that resumes the conversation after finished tool calls
    ///
    /// Adds no user message; the response extends the last assistant
    /// message.
    pub fn continuation_request(&mut self) -> Option<ChatRequest> {
        if self.is_submitting || !last_assistant_message_is_complete_with_tool_calls(&self.messages)
        {
            return None;
        }
        let last = self.messages.len() - 1;
        self.begin(Target::Existing(last));
        Some(self.request())
    }

    fn begin(&mut self, target: Target) {
        self.is_submitting = true;
        self.target = target;
        self.open_text.clear();
    }

    fn request(&self) -> ChatRequest {
        ChatRequest {
            id: Some(self.id.clone()),
            messages: self.messages.clone(),
        }
    }

    /// Fold one stream chunk into the in-progress assistant message
    pub fn apply_chunk(&mut self, chunk: UiStreamChunk) {
        match chunk {
            UiStreamChunk::Start { message_id } => {
                let message = self.target_message();
                if let Some(id) = message_id {
                    if message.parts.is_empty() {
                        message.id = id;
                    }
                }
            }
            UiStreamChunk::StartStep => {
                self.target_message().parts.push(UiPart::StepStart);
            }
            UiStreamChunk::TextStart { id } => {
                let message = self.target_message();
                message.parts.push(UiPart::Text {
                    text: String::new(),
                });
                let index = message.parts.len() - 1;
                self.open_text.insert(id, index);
            }
            UiStreamChunk::TextDelta { id, delta } => self.append_text(&id, &delta),
            UiStreamChunk::TextEnd { id } => {
                self.open_text.remove(&id);
            }
            UiStreamChunk::ToolInputStart {
                tool_call_id,
                tool_name,
            } => {
                self.tool_part(&tool_call_id, &tool_name);
            }
            UiStreamChunk::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => {
                if let Some(tool) = self.target_message().tool_part_mut(&tool_call_id) {
                    tool.append_input_text(&input_text_delta);
                }
            }
            UiStreamChunk::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                let tool = self.tool_part(&tool_call_id, &tool_name);
                if let Err(e) = tool.set_input_available(input) {
                    tracing::warn!("Ignoring chunk: {}", e);
                }
            }
            UiStreamChunk::ToolOutputAvailable {
                tool_call_id,
                output,
            } => match self.target_message().tool_part_mut(&tool_call_id) {
                Some(tool) => {
                    if let Err(e) = tool.set_output(output) {
                        tracing::warn!("Ignoring chunk: {}", e);
                    }
                }
                None => tracing::warn!("Output for unknown tool call {}", tool_call_id),
            },
            UiStreamChunk::ToolOutputError {
                tool_call_id,
                error_text,
            } => match self.target_message().tool_part_mut(&tool_call_id) {
                Some(tool) => {
                    if let Err(e) = tool.set_error(error_text) {
                        tracing::warn!("Ignoring chunk: {}", e);
                    }
                }
                None => tracing::warn!("Error for unknown tool call {}", tool_call_id),
            },
            UiStreamChunk::FinishStep => self.open_text.clear(),
            UiStreamChunk::Finish | UiStreamChunk::Unknown => {}
            UiStreamChunk::Error { error_text } => {
                self.last_error = Some(error_text);
            }
        }
    }

    /// The response ended normally
    pub fn finish(&mut self) {
        self.is_submitting = false;
        self.open_text.clear();
    }

    /// The response failed; the session shows `error` until the next submit
    pub fn fail(&mut self, error: impl Into<String>) {
        self.is_submitting = false;
        self.open_text.clear();
        self.last_error = Some(error.into());
    }

    /// The assistant message receiving the current response
    fn target_message(&mut self) -> &mut UiMessage {
        let index = match self.target {
            Target::Existing(index) if index < self.messages.len() => index,
            _ => {
                self.messages.push(UiMessage::new(UiRole::Assistant));
                let index = self.messages.len() - 1;
                self.target = Target::Existing(index);
                index
            }
        };
        &mut self.messages[index]
    }

    fn append_text(&mut self, id: &str, delta: &str) {
        let open = self.open_text.get(id).copied();
        let message = self.target_message();
        if let Some(UiPart::Text { text }) = open.and_then(|i| message.parts.get_mut(i)) {
            text.push_str(delta);
            return;
        }

        // Delta without a text-start: extend a trailing text part or open one
        if let Some(UiPart::Text { text }) = message.parts.last_mut() {
            text.push_str(delta);
            return;
        }
        message.parts.push(UiPart::Text {
            text: delta.to_string(),
        });
        let index = message.parts.len() - 1;
        self.open_text.insert(id.to_string(), index);
    }

    /// Existing tool part for this call, or a new one in input-streaming
    fn tool_part(&mut self, tool_call_id: &str, tool_name: &str) -> &mut UiToolPart {
        let message = self.target_message();
        let position = message.parts.iter().position(
            |p| matches!(p, UiPart::Tool(tool) if tool.tool_call_id == tool_call_id),
        );
        let index = match position {
            Some(index) => index,
            None => {
                message
                    .parts
                    .push(UiPart::Tool(UiToolPart::new(tool_call_id, tool_name)));
                message.parts.len() - 1
            }
        };
        match &mut message.parts[index] {
            UiPart::Tool(tool) => tool,
            _ => unreachable!("index points at a tool part"),
        }
    }
}
