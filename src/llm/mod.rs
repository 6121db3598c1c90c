//! LLM provider implementations

use crate::config::{ConfigError, LlmConfig};

mod error;
mod openai;
mod sim;
pub mod streaming;
mod types;

pub use error::LlmError;
pub use openai::OpenAiProvider;
pub use sim::SimProvider;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Model identifier sent with every request
    fn model(&self) -> &str;

    /// Send a chat completion request (non-streaming)
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse>;

    /// Send a streaming chat completion request
    ///
    /// The callback is invoked for each chunk as it arrives from the LLM.
    ///
    /// Default implementation falls back to non-streaming `chat()` and
    /// replays the complete response as events.
    async fn chat_streaming(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        callback: StreamCallback,
    ) -> Result<LlmResponse> {
        let response = self.chat(messages, tools).await?;

        if let Some(text) = response.text() {
            callback(StreamEvent::TextDelta(text.to_string()));
        }

        for tool_call in response.tool_calls() {
            callback(StreamEvent::ToolCallStart {
                id: tool_call.id.clone(),
                name: tool_call.name.clone(),
            });
            callback(StreamEvent::ToolCallDelta {
                id: tool_call.id.clone(),
                arguments_delta: tool_call.arguments.to_string(),
            });
            callback(StreamEvent::ToolCallComplete {
                id: tool_call.id.clone(),
            });
        }

        callback(StreamEvent::Done);
        Ok(response)
    }

    /// Whether `chat_streaming` streams natively rather than replaying `chat`
    fn supports_streaming(&self) -> bool {
        false
    }
}

/// Create the configured LLM provider
///
/// Called once at startup; a missing credential fails here rather than on the
/// first request.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, ConfigError> {
    match config.provider.to_lowercase().as_str() {
        "openai" | "gpt" => Ok(Box::new(OpenAiProvider::from_config(&config.openai)?)),
        "sim" | "simulated" => Ok(Box::new(SimProvider::new())),
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FixedProvider;

    #[async_trait]
    impl LlmProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-1"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse::Mixed {
                text: Some("Computing.".to_string()),
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "squareRoot".to_string(),
                    arguments: serde_json::json!({"number": 4, "decimalPlaces": 0}),
                }],
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn test_default_streaming_replays_response() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let provider = FixedProvider;

        let response = provider
            .chat_streaming(
                &[Message::user("hi")],
                None,
                Box::new(move |e| sink.lock().unwrap().push(e)),
            )
            .await
            .unwrap();

        assert!(!provider.supports_streaming());
        assert_eq!(response.tool_calls().len(), 1);
        let events = events.lock().unwrap();
        assert_eq!(events[0], StreamEvent::TextDelta("Computing.".to_string()));
        assert!(matches!(&events[1], StreamEvent::ToolCallStart { name, .. } if name == "squareRoot"));
        assert!(matches!(&events[3], StreamEvent::ToolCallComplete { .. }));
        assert_eq!(events[4], StreamEvent::Done);
    }

    #[test]
    fn test_create_sim_provider() {
        let config = LlmConfig {
            provider: "sim".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "sim");
    }

    #[test]
    fn test_create_unknown_provider_fails() {
        let config = LlmConfig {
            provider: "llamacorp".to_string(),
            ..Default::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownProvider(name) if name == "llamacorp"));
    }
}
