//! Deterministic offline provider
//!
//! Registered as provider "sim" with model "sim-1". Needs no credential and
//! makes no network calls, so the server and client can be exercised end to
//! end on a laptop or in tests:
//! - a user turn mentioning a number while `squareRoot` is offered → one
//!   `squareRoot` tool call (decimal places taken from "N decimal places",
//!   default 2)
//! - a turn ending in tool results → a text answer quoting each result
//! - anything else → the user text echoed back

use super::{
    LlmProvider, LlmResponse, Message, Role, StreamCallback, StreamEvent,
    StreamingResponseBuilder, ToolDefinition,
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

const SQUARE_ROOT_TOOL: &str = "squareRoot";

/// What the simulated model decided to do for one turn
#[derive(Debug, Clone, PartialEq)]
enum SimTurn {
    Text(String),
    ToolCall { number: f64, decimal_places: u32 },
}

pub struct SimProvider {
    model: String,
    call_counter: AtomicUsize,
}

impl Default for SimProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimProvider {
    pub fn new() -> Self {
        Self {
            model: "sim-1".to_string(),
            call_counter: AtomicUsize::new(0),
        }
    }

    /// Number of completions served so far
    pub fn calls(&self) -> usize {
        self.call_counter.load(Ordering::SeqCst)
    }

    fn plan_turn(messages: &[Message], tools: Option<&[ToolDefinition]>) -> SimTurn {
        // Answer from the trailing run of tool results, if any
        let results: Vec<String> = messages
            .iter()
            .rev()
            .take_while(|m| m.role == Role::Tool)
            .filter_map(|m| m.content.as_text())
            .collect();
        if !results.is_empty() {
            let answers: Vec<String> = results
                .iter()
                .rev()
                .map(|r| describe_tool_result(r))
                .collect();
            return SimTurn::Text(answers.join(" "));
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.as_text())
            .unwrap_or_default();

        let offers_sqrt = tools
            .map(|t| t.iter().any(|d| d.name == SQUARE_ROOT_TOOL))
            .unwrap_or(false);
        if offers_sqrt {
            if let Some(number) = first_number(&last_user) {
                return SimTurn::ToolCall {
                    number,
                    decimal_places: requested_decimal_places(&last_user).unwrap_or(2),
                };
            }
        }

        if last_user.trim().is_empty() {
            SimTurn::Text("Say something and I will echo it back.".to_string())
        } else {
            SimTurn::Text(format!("You said: {}", last_user.trim()))
        }
    }
}

fn describe_tool_result(content: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => match value.get("result") {
            Some(result) => format!("The square root is {}.", result),
            None => format!("The tool reported: {}.", content),
        },
        Err(_) => format!("The tool reported: {}.", content),
    }
}

/// First numeric token in the text, sign included
fn first_number(text: &str) -> Option<f64> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '?' || c == '(' || c == ')')
        .map(|w| w.trim_end_matches('.'))
        .find_map(|w| w.parse::<f64>().ok().filter(|n| n.is_finite()))
}

/// "N decimal places" / "N decimals" in the text
fn requested_decimal_places(text: &str) -> Option<u32> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let next = pair[1].to_lowercase();
        if next.starts_with("decimal") {
            pair[0].parse::<u32>().ok()
        } else {
            None
        }
    })
}

/// Split text into word-sized deltas, keeping whitespace attached
fn text_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch == ' ' {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl LlmProvider for SimProvider {
    fn name(&self) -> &str {
        "sim"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse> {
        self.chat_streaming(messages, tools, Box::new(|_| {})).await
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        callback: StreamCallback,
    ) -> Result<LlmResponse> {
        let turn_index = self.call_counter.fetch_add(1, Ordering::SeqCst);
        let turn = Self::plan_turn(messages, tools);
        tracing::debug!("Sim turn {}: {:?}", turn_index, turn);

        let mut builder = StreamingResponseBuilder::new();
        let mut emit = |event: StreamEvent| {
            builder.process(&event);
            callback(event);
        };

        match turn {
            SimTurn::Text(text) => {
                for chunk in text_chunks(&text) {
                    emit(StreamEvent::TextDelta(chunk));
                    tokio::task::yield_now().await;
                }
            }
            SimTurn::ToolCall {
                number,
                decimal_places,
            } => {
                let id = format!("call_sim_{}", turn_index);
                let arguments = serde_json::json!({
                    "number": number,
                    "decimalPlaces": decimal_places,
                })
                .to_string();
                emit(StreamEvent::ToolCallStart {
                    id: id.clone(),
                    name: SQUARE_ROOT_TOOL.to_string(),
                });
                emit(StreamEvent::ToolCallDelta {
                    id: id.clone(),
                    arguments_delta: arguments,
                });
                emit(StreamEvent::ToolCallComplete { id });
            }
        }
        emit(StreamEvent::Done);

        Ok(builder.build())
    }
}
