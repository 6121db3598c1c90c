//! Multi-step chat runner
//!
//! Calls the provider, runs any tools it asks for, feeds the results back and
//! calls it again until it answers without tools or the step limit is hit.
//! Progress goes out as UI stream chunks over a channel.

use crate::llm::{LlmProvider, Message, StreamCallback, StreamEvent, TokenUsage, ToolCall};
use crate::tools::ToolRegistry;
use crate::ui::UiStreamChunk;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;

pub const DEFAULT_MAX_STEPS: usize = 5;

/// Sent to the client when the provider fails after output has started
const STREAM_FAILURE_TEXT: &str = "The model provider failed while responding.";

/// What happened during one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub tool_calls_made: usize,
    pub usage: TokenUsage,
    /// The receiver went away before the run finished
    pub cancelled: bool,
    /// The provider failed after output started; an `error` chunk was sent
    pub failed: bool,
}

#[derive(Clone)]
pub struct ChatRunner {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
}

impl ChatRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Run one request to completion
    ///
    /// Returns `Err` only if the provider failed before anything was sent,
    /// in which case `tx` received nothing and the caller can still answer
    /// with a plain error response.
    pub async fn run(
        &self,
        mut history: Vec<Message>,
        tx: UnboundedSender<UiStreamChunk>,
    ) -> Result<RunSummary> {
        let writer = Arc::new(Mutex::new(StreamWriter::new(tx)));
        let definitions = self.tools.definitions();
        let tools = (!definitions.is_empty()).then_some(definitions.as_slice());
        let mut summary = RunSummary::default();

        for step in 0..self.max_steps {
            if lock(&writer).disconnected {
                tracing::info!("Client went away before step {}", step + 1);
                summary.cancelled = true;
                return Ok(summary);
            }

            tracing::debug!(
                "Step {} with {} messages via {}",
                step + 1,
                history.len(),
                self.provider.name()
            );

            let callback_writer = writer.clone();
            let callback: StreamCallback = Box::new(move |event: StreamEvent| {
                let mut w = lock(&callback_writer);
                match event {
                    StreamEvent::TextDelta(text) => w.text_delta(&text),
                    StreamEvent::ToolCallStart { id, name } => w.tool_input_start(&id, &name),
                    StreamEvent::ToolCallDelta {
                        id,
                        arguments_delta,
                    } => w.tool_input_delta(&id, &arguments_delta),
                    StreamEvent::Error(err) => tracing::warn!("Provider stream error: {}", err),
                    StreamEvent::ToolCallComplete { .. } | StreamEvent::Done => {}
                }
            });

            let response = match self
                .provider
                .chat_streaming(&history, tools, callback)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    let mut w = lock(&writer);
                    if !w.started {
                        return Err(e);
                    }
                    tracing::error!("Provider failed mid-stream: {:#}", e);
                    w.close_text();
                    w.emit(UiStreamChunk::Error {
                        error_text: STREAM_FAILURE_TEXT.to_string(),
                    });
                    summary.failed = true;
                    return Ok(summary);
                }
            };

            summary.steps += 1;
            if let Some(usage) = response.usage() {
                summary.usage.input_tokens += usage.input_tokens;
                summary.usage.output_tokens += usage.output_tokens;
                summary.usage.total_tokens += usage.total_tokens;
            }

            let calls: Vec<ToolCall> = response.tool_calls().to_vec();
            if calls.is_empty() {
                let mut w = lock(&writer);
                // Non-streamed text that never came through the callback
                if !w.step_has_text {
                    if let Some(text) = response.text().filter(|t| !t.is_empty()) {
                        w.text_delta(text);
                    }
                }
                w.finish_step();
                w.finish();
                return Ok(summary);
            }

            summary.tool_calls_made += calls.len();
            history.push(Message::assistant_tool_calls(
                response.text().map(str::to_string),
                &calls,
            ));

            for call in &calls {
                lock(&writer).tool_input_available(call);
                tracing::info!("Running tool {} ({})", call.name, call.id);

                let result = self.tools.execute(&call.name, call.arguments.clone()).await;
                let chunk = match result.error_text() {
                    None => UiStreamChunk::ToolOutputAvailable {
                        tool_call_id: call.id.clone(),
                        output: result.output.clone(),
                    },
                    Some(error_text) => UiStreamChunk::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text,
                    },
                };
                lock(&writer).emit(chunk);
                history.push(Message::tool_result(
                    call.id.clone(),
                    result.to_model_content(),
                ));
            }

            lock(&writer).finish_step();
        }

        tracing::info!(
            "Stopped after {} steps with tool results pending",
            self.max_steps
        );
        lock(&writer).finish();
        Ok(summary)
    }
}

fn lock(writer: &Mutex<StreamWriter>) -> MutexGuard<'_, StreamWriter> {
    writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Turns provider events into correctly framed chunks
///
/// `start` and `start-step` are held back until there is content, so a
/// provider that fails immediately leaves the channel untouched.
struct StreamWriter {
    tx: UnboundedSender<UiStreamChunk>,
    message_id: String,
    started: bool,
    step_open: bool,
    step_has_text: bool,
    text_id: Option<String>,
    tools_seen: HashSet<String>,
    disconnected: bool,
}

impl StreamWriter {
    fn new(tx: UnboundedSender<UiStreamChunk>) -> Self {
        Self {
            tx,
            message_id: format!("msg-{}", uuid::Uuid::new_v4().simple()),
            started: false,
            step_open: false,
            step_has_text: false,
            text_id: None,
            tools_seen: HashSet::new(),
            disconnected: false,
        }
    }

    fn send(&mut self, chunk: UiStreamChunk) {
        if self.disconnected {
            return;
        }
        if self.tx.send(chunk).is_err() {
            self.disconnected = true;
        }
    }

    fn emit(&mut self, chunk: UiStreamChunk) {
        if !self.started {
            self.started = true;
            let message_id = Some(self.message_id.clone());
            self.send(UiStreamChunk::Start { message_id });
        }
        self.send(chunk);
    }

    fn open_step(&mut self) {
        if !self.step_open {
            self.emit(UiStreamChunk::StartStep);
            self.step_open = true;
        }
    }

    fn text_delta(&mut self, delta: &str) {
        self.open_step();
        self.step_has_text = true;
        let id = match &self.text_id {
            Some(id) => id.clone(),
            None => {
                let id = format!("text-{}", uuid::Uuid::new_v4().simple());
                self.emit(UiStreamChunk::TextStart { id: id.clone() });
                self.text_id = Some(id.clone());
                id
            }
        };
        self.emit(UiStreamChunk::TextDelta {
            id,
            delta: delta.to_string(),
        });
    }

    fn close_text(&mut self) {
        if let Some(id) = self.text_id.take() {
            self.emit(UiStreamChunk::TextEnd { id });
        }
    }

    fn tool_input_start(&mut self, id: &str, name: &str) {
        self.open_step();
        self.close_text();
        if self.tools_seen.insert(id.to_string()) {
            self.emit(UiStreamChunk::ToolInputStart {
                tool_call_id: id.to_string(),
                tool_name: name.to_string(),
            });
        }
    }

    fn tool_input_delta(&mut self, id: &str, delta: &str) {
        if self.tools_seen.contains(id) {
            self.emit(UiStreamChunk::ToolInputDelta {
                tool_call_id: id.to_string(),
                input_text_delta: delta.to_string(),
            });
        }
    }

    fn tool_input_available(&mut self, call: &ToolCall) {
        self.tool_input_start(&call.id, &call.name);
        self.emit(UiStreamChunk::ToolInputAvailable {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            input: call.arguments.clone(),
        });
    }

    fn finish_step(&mut self) {
        self.close_text();
        if self.step_open {
            self.emit(UiStreamChunk::FinishStep);
            self.step_open = false;
        }
        self.step_has_text = false;
    }

    fn finish(&mut self) {
        self.finish_step();
        self.emit(UiStreamChunk::Finish);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, SimProvider, ToolDefinition};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    async fn collect(runner: &ChatRunner, text: &str) -> (Result<RunSummary>, Vec<UiStreamChunk>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = runner.run(vec![Message::user(text)], tx).await;
        let mut chunks = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            chunks.push(chunk);
        }
        (result, chunks)
    }

    fn sim_runner() -> ChatRunner {
        ChatRunner::new(
            Arc::new(SimProvider::new()),
            Arc::new(ToolRegistry::with_defaults()),
        )
    }

    fn kinds(chunks: &[UiStreamChunk]) -> Vec<String> {
        chunks
            .iter()
            .map(|c| serde_json::to_value(c).unwrap()["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_text_only_run() {
        let (result, chunks) = collect(&sim_runner(), "hello there").await;
        let summary = result.unwrap();
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.tool_calls_made, 0);

        let kinds = kinds(&chunks);
        assert_eq!(kinds.first().map(String::as_str), Some("start"));
        assert_eq!(kinds[1], "start-step");
        assert_eq!(kinds[2], "text-start");
        assert_eq!(&kinds[kinds.len() - 3..], ["text-end", "finish-step", "finish"]);

        let text: String = chunks
            .iter()
            .filter_map(|c| match c {
                UiStreamChunk::TextDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "You said: hello there");
    }

    #[tokio::test]
    async fn test_tool_round_trip_within_one_run() {
        let (result, chunks) = collect(&sim_runner(), "square root of 2 to 4 decimal places").await;
        let summary = result.unwrap();
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.tool_calls_made, 1);

        let kinds = kinds(&chunks);
        assert_eq!(
            &kinds[..7],
            [
                "start",
                "start-step",
                "tool-input-start",
                "tool-input-delta",
                "tool-input-available",
                "tool-output-available",
                "finish-step",
            ]
        );
        assert!(chunks.contains(&UiStreamChunk::ToolOutputAvailable {
            tool_call_id: "call_sim_0".into(),
            output: serde_json::json!({"result": 1.4142}),
        }));
        assert_eq!(kinds.last().map(String::as_str), Some("finish"));
    }

    #[tokio::test]
    async fn test_negative_input_becomes_tool_error() {
        let (result, chunks) = collect(&sim_runner(), "square root of -4").await;
        result.unwrap();
        let error = chunks.iter().find_map(|c| match c {
            UiStreamChunk::ToolOutputError { error_text, .. } => Some(error_text.clone()),
            _ => None,
        });
        assert!(error.unwrap().starts_with("Invalid input"));
    }

    #[tokio::test]
    async fn test_step_limit_leaves_results_for_client() {
        let runner = sim_runner().with_max_steps(1);
        let (result, chunks) = collect(&runner, "root of 9").await;
        assert_eq!(result.unwrap().steps, 1);

        let kinds = kinds(&chunks);
        assert!(!kinds.contains(&"text-delta".to_string()));
        assert_eq!(&kinds[kinds.len() - 3..], ["tool-output-available", "finish-step", "finish"]);
    }

    struct BrokenProvider {
        partial: Option<&'static str>,
    }

    #[async_trait]
    impl LlmProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        fn model(&self) -> &str {
            "broken-1"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
        ) -> Result<LlmResponse> {
            anyhow::bail!("connection reset")
        }

        async fn chat_streaming(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            callback: StreamCallback,
        ) -> Result<LlmResponse> {
            if let Some(text) = self.partial {
                callback(StreamEvent::TextDelta(text.to_string()));
            }
            anyhow::bail!("connection reset")
        }
    }

    #[tokio::test]
    async fn test_failure_before_output_sends_nothing() {
        let runner = ChatRunner::new(
            Arc::new(BrokenProvider { partial: None }),
            Arc::new(ToolRegistry::with_defaults()),
        );
        let (result, chunks) = collect(&runner, "hi").await;
        assert!(result.is_err());
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_failure_mid_stream_sends_error_chunk() {
        let runner = ChatRunner::new(
            Arc::new(BrokenProvider {
                partial: Some("Par"),
            }),
            Arc::new(ToolRegistry::with_defaults()),
        );
        let (result, chunks) = collect(&runner, "hi").await;
        assert!(result.unwrap().failed);

        let kinds = kinds(&chunks);
        assert_eq!(
            kinds,
            ["start", "start-step", "text-start", "text-delta", "text-end", "error"]
        );
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let summary = sim_runner()
            .run(vec![Message::user("root of 16")], tx)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.steps, 1);
    }
}
