//! OpenAI Chat Completions provider
//!
//! Works against api.openai.com or any endpoint that speaks the same Chat
//! Completions dialect (set `llm.openai.base_url`). The API key is only ever
//! sent to the configured base URL.

use super::{
    streaming::SseDecoder, ContentPart, LlmError, LlmProvider, LlmResponse, Message,
    MessageContent, Role, StreamCallback, StreamEvent, StreamingResponseBuilder, TokenUsage,
    ToolCall, ToolDefinition,
};
use crate::config::{ConfigError, OpenAiConfig, OPENAI_API_KEY_ENV};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Abort a stream that produces no bytes for this long
const STREAM_CHUNK_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: usize,
    /// Bound on connecting and receiving response headers
    request_timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = OpenAiConfig::default();
        let request_timeout = Duration::from_secs(defaults.request_timeout_secs);
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(request_timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: defaults.base_url,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            request_timeout,
        }
    }

    /// Build from config, reading the key from `OPENAI_API_KEY`
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, ConfigError> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredential(OPENAI_API_KEY_ENV))?;

        Ok(Self::new(api_key)
            .with_model(&config.model)
            .with_max_tokens(config.max_tokens)
            .with_base_url(&config.base_url)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };

                match &msg.content {
                    MessageContent::Text(text) => OpenAiMessage {
                        role: role.to_string(),
                        content: Some(text.clone()),
                        tool_calls: None,
                        tool_call_id: msg.tool_call_id.clone(),
                    },
                    MessageContent::Parts(parts) => {
                        let tool_calls: Vec<OpenAiToolCall> = parts
                            .iter()
                            .filter_map(|p| match p {
                                ContentPart::ToolUse { id, name, input } => Some(OpenAiToolCall {
                                    id: id.clone(),
                                    call_type: "function".to_string(),
                                    function: OpenAiFunctionCall {
                                        name: name.clone(),
                                        arguments: input.to_string(),
                                    },
                                }),
                                ContentPart::Text { .. } => None,
                            })
                            .collect();

                        OpenAiMessage {
                            role: role.to_string(),
                            content: msg.content.as_text(),
                            tool_calls: (!tool_calls.is_empty() && msg.role == Role::Assistant)
                                .then_some(tool_calls),
                            tool_call_id: msg.tool_call_id.clone(),
                        }
                    }
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAiTool> {
        tools
            .iter()
            .map(|t| OpenAiTool {
                tool_type: "function".to_string(),
                function: OpenAiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        stream: bool,
    ) -> OpenAiRequest {
        let tools = tools.filter(|t| !t.is_empty());
        OpenAiRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(messages),
            max_tokens: Some(self.max_tokens),
            tool_choice: tools.map(|_| "auto".to_string()),
            tools: tools.map(Self::convert_tools),
            stream: stream.then_some(true),
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(&self, request: &OpenAiRequest) -> Result<reqwest::Response> {
        tracing::debug!(
            "Sending {} messages to {} (model {}, stream {})",
            request.messages.len(),
            self.base_url,
            request.model,
            request.stream.unwrap_or(false)
        );

        let pending = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send();
        let response = tokio::time::timeout(self.request_timeout, pending)
            .await
            .map_err(|_| {
                LlmError::Network(format!(
                    "Request timeout - no response from OpenAI within {} seconds",
                    self.request_timeout.as_secs_f32()
                ))
            })?
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI API error ({}): {}", status, error_text);
            return Err(LlmError::from_http_status(status, error_text).into());
        }

        Ok(response)
    }

    fn parse_response(response: OpenAiResponse) -> Result<LlmResponse> {
        let usage = response.usage.map(TokenUsage::from);
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("OpenAI response contained no choices")?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| serde_json::json!({})),
            })
            .collect();
        let text = message.content.filter(|t| !t.is_empty());

        Ok(match (text, tool_calls.is_empty()) {
            (text, true) => LlmResponse::Text {
                text: text.unwrap_or_default(),
                usage,
            },
            (None, false) => LlmResponse::ToolCalls {
                calls: tool_calls,
                usage,
            },
            (text, false) => LlmResponse::Mixed {
                text,
                tool_calls,
                usage,
            },
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        let request = self.build_request(messages, tools, false);
        let response = self.send(&request).await?;
        let body: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;
        Self::parse_response(body)
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        callback: StreamCallback,
    ) -> Result<LlmResponse> {
        use futures::StreamExt;
        use tokio::time::timeout;

        let request = self.build_request(messages, tools, true);
        let response = self.send(&request).await?;

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut state = CompletionStreamState::default();

        loop {
            let chunk = match timeout(STREAM_CHUNK_TIMEOUT, stream.next()).await {
                Ok(Some(chunk)) => chunk.map_err(LlmError::from_network_error)?,
                Ok(None) => break,
                Err(_) => {
                    return Err(LlmError::Network(format!(
                        "Stream timeout - no data from OpenAI for {} seconds",
                        STREAM_CHUNK_TIMEOUT.as_secs()
                    ))
                    .into());
                }
            };

            for payload in decoder.push(&chunk) {
                state.apply_payload(&payload, &callback)?;
            }
        }

        for payload in decoder.finish() {
            state.apply_payload(&payload, &callback)?;
        }

        Ok(state.finish(&callback)?)
    }
}

/// Accumulates Chat Completions stream chunks into provider-neutral events
///
/// Tool call deltas are keyed by `index`; only the first delta of a call
/// carries its id and name. An `error` object in the stream, or a stream that
/// ends with neither a `finish_reason` nor `[DONE]`, is a failure.
#[derive(Default)]
struct CompletionStreamState {
    builder: StreamingResponseBuilder,
    tool_ids: HashMap<usize, String>,
    completed: bool,
    done: bool,
}

impl CompletionStreamState {
    fn apply_payload(&mut self, payload: &str, callback: &StreamCallback) -> Result<(), LlmError> {
        if payload.trim() == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        match serde_json::from_str::<OpenAiStreamChunk>(payload) {
            Ok(OpenAiStreamChunk {
                error: Some(error), ..
            }) => {
                let message = error
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                tracing::error!("OpenAI stream reported an error: {}", message);
                return Err(LlmError::ServiceError(message));
            }
            Ok(chunk) => self.apply_chunk(chunk, callback),
            Err(e) => tracing::warn!("Skipping unparseable stream chunk: {}", e),
        }
        Ok(())
    }

    fn apply_chunk(&mut self, chunk: OpenAiStreamChunk, callback: &StreamCallback) {
        let mut emit = |event: StreamEvent| {
            self.builder.process(&event);
            callback(event);
        };

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                emit(StreamEvent::TextDelta(content));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                if let Some(id) = tc.id.clone() {
                    let name = tc
                        .function
                        .as_ref()
                        .and_then(|f| f.name.clone())
                        .unwrap_or_default();
                    self.tool_ids.insert(tc.index, id.clone());
                    emit(StreamEvent::ToolCallStart { id, name });
                }

                let args = tc
                    .function
                    .and_then(|f| f.arguments)
                    .filter(|a| !a.is_empty());
                if let (Some(args), Some(id)) = (args, self.tool_ids.get(&tc.index)) {
                    emit(StreamEvent::ToolCallDelta {
                        id: id.clone(),
                        arguments_delta: args,
                    });
                }
            }

            if choice.finish_reason.is_some() {
                self.complete_tool_calls(callback);
            }
        }

        if let Some(usage) = chunk.usage {
            self.builder.usage = Some(usage.into());
        }
    }

    fn complete_tool_calls(&mut self, callback: &StreamCallback) {
        if self.completed {
            return;
        }
        self.completed = true;
        let mut indices: Vec<_> = self.tool_ids.keys().copied().collect();
        indices.sort_unstable();
        for idx in indices {
            callback(StreamEvent::ToolCallComplete {
                id: self.tool_ids[&idx].clone(),
            });
        }
    }

    fn finish(mut self, callback: &StreamCallback) -> Result<LlmResponse, LlmError> {
        if !self.completed && !self.done {
            return Err(LlmError::Network(
                "OpenAI stream ended before the response was complete".to_string(),
            ));
        }
        self.complete_tool_calls(callback);
        callback(StreamEvent::Done);
        Ok(self.builder.build())
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    /// Include usage statistics in the final chunk
    include_usage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(usage: OpenAiUsage) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_callback() -> (StreamCallback, Arc<Mutex<Vec<StreamEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: StreamCallback = Box::new(move |event| sink.lock().unwrap().push(event));
        (callback, events)
    }

    #[test]
    fn test_convert_messages_with_tool_round_trip() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "squareRoot".into(),
            arguments: serde_json::json!({"number": 2, "decimalPlaces": 4}),
        };
        let messages = vec![
            Message::user("sqrt of 2?"),
            Message::assistant_tool_calls(None, std::slice::from_ref(&call)),
            Message::tool_result("call_1", "{\"result\":1.4142}"),
        ];

        let converted = OpenAiProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
        assert!(converted[1].content.is_none());
        let calls = converted[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "squareRoot");
        let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(args["decimalPlaces"], 4);
        assert_eq!(converted[2].role, "tool");
        assert_eq!(converted[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_build_request_streaming_with_tools() {
        let provider = OpenAiProvider::new("test-key").with_model("gpt-4o-mini");
        let tools = vec![ToolDefinition {
            name: "squareRoot".into(),
            description: "sqrt".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let request = provider.build_request(&[Message::user("hi")], Some(&tools), true);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["tool_choice"], "auto");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "squareRoot");
    }

    #[test]
    fn test_build_request_without_tools_omits_fields() {
        let provider = OpenAiProvider::new("test-key");
        let request = provider.build_request(&[Message::user("hi")], Some(&[]), false);
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OpenAiProvider::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_stream_state_text_and_usage() {
        let (callback, events) = recording_callback();
        let mut state = CompletionStreamState::default();

        state.apply_payload(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#, &callback).unwrap();
        state.apply_payload(r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#, &callback).unwrap();
        state.apply_payload(
            r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
            &callback,
        ).unwrap();
        state.apply_payload("[DONE]", &callback).unwrap();
        let response = state.finish(&callback).unwrap();

        assert_eq!(response.text(), Some("Hello"));
        assert_eq!(response.usage().map(|u| u.total_tokens), Some(5));
        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                StreamEvent::TextDelta("Hel".into()),
                StreamEvent::TextDelta("lo".into()),
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn test_stream_state_tool_call_deltas() {
        let (callback, events) = recording_callback();
        let mut state = CompletionStreamState::default();

        state.apply_payload(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"squareRoot","arguments":""}}]}}]}"#,
            &callback,
        ).unwrap();
        state.apply_payload(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"number\":2,"}}]}}]}"#,
            &callback,
        ).unwrap();
        state.apply_payload(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"decimalPlaces\":4}"}}]}}]}"#,
            &callback,
        ).unwrap();
        state.apply_payload(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            &callback,
        ).unwrap();
        let response = state.finish(&callback).unwrap();

        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "squareRoot");
        assert_eq!(calls[0].arguments["number"], 2);

        let events = events.lock().unwrap();
        assert!(matches!(&events[0], StreamEvent::ToolCallStart { id, name } if id == "call_1" && name == "squareRoot"));
        assert!(matches!(&events[1], StreamEvent::ToolCallDelta { .. }));
        // Completion is emitted once even though finish() runs after finish_reason
        let completes = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolCallComplete { .. }))
            .count();
        assert_eq!(completes, 1);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn test_stream_state_error_object_fails() {
        let (callback, events) = recording_callback();
        let mut state = CompletionStreamState::default();

        state
            .apply_payload(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#, &callback)
            .unwrap();
        let err = state
            .apply_payload(
                r#"{"error":{"message":"The server had an error while processing your request.","type":"server_error"}}"#,
                &callback,
            )
            .unwrap_err();

        assert!(matches!(err, LlmError::ServiceError(ref msg) if msg.starts_with("The server had an error")));
        assert_eq!(*events.lock().unwrap(), vec![StreamEvent::TextDelta("Hi".into())]);
    }

    #[test]
    fn test_stream_state_truncated_stream_fails() {
        let (callback, events) = recording_callback();
        let mut state = CompletionStreamState::default();

        state
            .apply_payload(r#"{"choices":[{"delta":{"content":"Par"}}]}"#, &callback)
            .unwrap();
        let err = state.finish(&callback).unwrap_err();

        assert!(matches!(err, LlmError::Network(_)));
        assert!(!events.lock().unwrap().contains(&StreamEvent::Done));
    }

    #[test]
    fn test_stream_state_done_without_finish_reason_completes() {
        let (callback, _events) = recording_callback();
        let mut state = CompletionStreamState::default();

        state
            .apply_payload(r#"{"choices":[{"delta":{"content":"ok"}}]}"#, &callback)
            .unwrap();
        state.apply_payload("[DONE]", &callback).unwrap();

        assert_eq!(state.finish(&callback).unwrap().text(), Some("ok"));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and hold them open without ever answering
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = OpenAiProvider::new("test-key")
            .with_base_url(&format!("http://{}/v1", addr))
            .with_request_timeout(Duration::from_millis(200));
        let (callback, _events) = recording_callback();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            provider.chat_streaming(&[Message::user("hi")], None, callback),
        )
        .await
        .expect("provider call should give up on its own");

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LlmError>(),
            Some(LlmError::Network(_))
        ));
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body: OpenAiResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": null,
                    "tool_calls": [{"id": "call_9", "type": "function",
                        "function": {"name": "squareRoot", "arguments": "{\"number\":9,\"decimalPlaces\":0}"}}]}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
            }"#,
        )
        .unwrap();

        let response = OpenAiProvider::parse_response(body).unwrap();
        assert!(matches!(response, LlmResponse::ToolCalls { .. }));
        assert_eq!(response.tool_calls()[0].arguments["number"], 9);
        assert_eq!(response.usage().unwrap().input_tokens, 10);
    }

    #[test]
    fn test_parse_response_without_choices_fails() {
        let body: OpenAiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(OpenAiProvider::parse_response(body).is_err());
    }
}
