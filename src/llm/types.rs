//! Shared types for LLM providers

use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a conversation, in provider-neutral form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// All text parts joined, or the plain text
    pub fn as_text(&self) -> Option<String> {
        match self {
            MessageContent::Text(s) => Some(s.clone()),
            MessageContent::Parts(parts) => {
                let text: String = parts
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

/// Part of a multi-part message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tools, optionally preceded by text
    pub fn assistant_tool_calls(text: Option<String>, calls: &[ToolCall]) -> Self {
        let mut parts = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            parts.push(ContentPart::Text { text });
        }
        parts.extend(calls.iter().map(|call| ContentPart::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        }));
        Self {
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(content.into()),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Response from an LLM
#[derive(Debug, Clone)]
pub enum LlmResponse {
    /// Plain text response
    Text {
        text: String,
        usage: Option<TokenUsage>,
    },
    /// Tool calls requested by the model
    ToolCalls {
        calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
    /// Mixed response with text and tool calls
    Mixed {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
        usage: Option<TokenUsage>,
    },
}

impl LlmResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            LlmResponse::Text { text, .. } => Some(text),
            LlmResponse::Mixed { text, .. } => text.as_deref(),
            LlmResponse::ToolCalls { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            LlmResponse::ToolCalls { calls, .. } => calls,
            LlmResponse::Mixed { tool_calls, .. } => tool_calls,
            LlmResponse::Text { .. } => &[],
        }
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            LlmResponse::Text { usage, .. } => usage.as_ref(),
            LlmResponse::ToolCalls { usage, .. } => usage.as_ref(),
            LlmResponse::Mixed { usage, .. } => usage.as_ref(),
        }
    }
}

/// A tool call from the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Definition of a tool for the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Events emitted during streaming responses
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Regular text chunk from the assistant
    TextDelta(String),
    /// Tool call started
    ToolCallStart { id: String, name: String },
    /// Tool call arguments chunk (arguments come incrementally)
    ToolCallDelta { id: String, arguments_delta: String },
    /// Tool call completed (all arguments received)
    ToolCallComplete { id: String },
    /// Stream completed successfully
    Done,
    /// Error during streaming
    Error(String),
}

/// Callback type for streaming events
///
/// Called for each chunk as it arrives from the LLM. Implementations should
/// be fast and non-blocking.
pub type StreamCallback = Box<dyn Fn(StreamEvent) + Send + Sync>;

/// Builder for accumulating a streaming response
#[derive(Debug, Default)]
pub struct StreamingResponseBuilder {
    /// Accumulated text content
    pub text: String,
    /// Tool calls in arrival order: (id, name, accumulated_args)
    pub tool_calls: Vec<(String, String, String)>,
    /// Token usage (if provided at end)
    pub usage: Option<TokenUsage>,
}

impl StreamingResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a stream event and accumulate content
    pub fn process(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(text) => {
                self.text.push_str(text);
            }
            StreamEvent::ToolCallStart { id, name } => {
                if !self.tool_calls.iter().any(|(known, _, _)| known == id) {
                    self.tool_calls
                        .push((id.clone(), name.clone(), String::new()));
                }
            }
            StreamEvent::ToolCallDelta {
                id,
                arguments_delta,
            } => {
                if let Some((_, _, args)) = self.tool_calls.iter_mut().find(|(k, _, _)| k == id) {
                    args.push_str(arguments_delta);
                }
            }
            StreamEvent::ToolCallComplete { .. } | StreamEvent::Done | StreamEvent::Error(_) => {}
        }
    }

    /// Build the final LlmResponse
    ///
    /// Arguments that fail to parse become `{}` so the tool layer reports a
    /// schema error instead of the whole turn failing.
    pub fn build(self) -> LlmResponse {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_iter()
            .map(|(id, name, args)| {
                let arguments = if args.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&args).unwrap_or_else(|e| {
                        tracing::warn!("Unparseable arguments for tool {}: {}", name, e);
                        serde_json::json!({})
                    })
                };
                ToolCall {
                    id,
                    name,
                    arguments,
                }
            })
            .collect();

        if tool_calls.is_empty() {
            LlmResponse::Text {
                text: self.text,
                usage: self.usage,
            }
        } else if self.text.is_empty() {
            LlmResponse::ToolCalls {
                calls: tool_calls,
                usage: self.usage,
            }
        } else {
            LlmResponse::Mixed {
                text: Some(self.text),
                tool_calls,
                usage: self.usage,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_response_text_with_usage() {
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        };
        let response = LlmResponse::Text {
            text: "Hello".to_string(),
            usage: Some(usage),
        };

        assert_eq!(response.text(), Some("Hello"));
        assert!(response.tool_calls().is_empty());
        assert_eq!(response.usage().map(|u| u.total_tokens), Some(15));
    }

    #[test]
    fn test_builder_text_only() {
        let mut builder = StreamingResponseBuilder::new();
        builder.process(&StreamEvent::TextDelta("Hel".into()));
        builder.process(&StreamEvent::TextDelta("lo".into()));
        builder.process(&StreamEvent::Done);

        let response = builder.build();
        assert_eq!(response.text(), Some("Hello"));
        assert!(matches!(response, LlmResponse::Text { .. }));
    }

    #[test]
    fn test_builder_keeps_tool_call_order() {
        let mut builder = StreamingResponseBuilder::new();
        for (id, n) in [("call_b", 9), ("call_a", 4)] {
            builder.process(&StreamEvent::ToolCallStart {
                id: id.into(),
                name: "squareRoot".into(),
            });
            builder.process(&StreamEvent::ToolCallDelta {
                id: id.into(),
                arguments_delta: format!("{{\"number\":{n},"),
            });
            builder.process(&StreamEvent::ToolCallDelta {
                id: id.into(),
                arguments_delta: "\"decimalPlaces\":2}".into(),
            });
        }

        let response = builder.build();
        let calls = response.tool_calls();
        assert!(matches!(response, LlmResponse::ToolCalls { .. }));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_b");
        assert_eq!(calls[0].arguments["number"], 9);
        assert_eq!(calls[1].id, "call_a");
        assert_eq!(calls[1].arguments["decimalPlaces"], 2);
    }

    #[test]
    fn test_builder_mixed_and_bad_arguments() {
        let mut builder = StreamingResponseBuilder::new();
        builder.process(&StreamEvent::TextDelta("Let me compute that.".into()));
        builder.process(&StreamEvent::ToolCallStart {
            id: "call_1".into(),
            name: "squareRoot".into(),
        });
        builder.process(&StreamEvent::ToolCallDelta {
            id: "call_1".into(),
            arguments_delta: "{\"number\":".into(),
        });

        let response = builder.build();
        assert_eq!(response.text(), Some("Let me compute that."));
        assert_eq!(response.tool_calls()[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn test_assistant_tool_calls_message() {
        let calls = vec![ToolCall {
            id: "call_1".into(),
            name: "squareRoot".into(),
            arguments: serde_json::json!({"number": 2, "decimalPlaces": 4}),
        }];
        let msg = Message::assistant_tool_calls(Some(String::new()), &calls);

        assert_eq!(msg.role, Role::Assistant);
        match msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(&parts[0], ContentPart::ToolUse { id, .. } if id == "call_1"));
            }
            MessageContent::Text(_) => panic!("Expected Parts content"),
        }
    }

    #[test]
    fn test_content_as_text_joins_parts() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "a".into() },
            ContentPart::ToolUse {
                id: "x".into(),
                name: "y".into(),
                input: serde_json::Value::Null,
            },
            ContentPart::Text { text: "b".into() },
        ]);
        assert_eq!(content.as_text().as_deref(), Some("ab"));
    }
}
