//! HTTP server for the chat endpoint and browser shell

use crate::agent::{ChatRunner, RunSummary};
use crate::config::{Config, ConfigError};
use crate::llm::{self, LlmProvider};
use crate::tools::ToolRegistry;
use crate::transport::error::ApiError;
use crate::ui::{convert_to_model_messages, ChatRequest, UiStreamChunk, DONE_MARKER};
use crate::ui::{UI_STREAM_HEADER, UI_STREAM_VERSION};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{future, stream, Future, Stream, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Sent in place of `[DONE]` when the run dies after output started
const STREAM_ABORTED_TEXT: &str = "The response was interrupted before it finished.";

/// Shared, read-only application state
pub struct AppState {
    provider: Arc<dyn LlmProvider>,
    runner: ChatRunner,
}

impl AppState {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, max_steps: usize) -> Self {
        let runner = ChatRunner::new(provider.clone(), tools).with_max_steps(max_steps);
        Self { provider, runner }
    }

    /// Build the provider and tools named by the configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let provider: Arc<dyn LlmProvider> = Arc::from(llm::create_provider(&config.llm)?);
        let tools = ToolRegistry::with_defaults().with_timeout(config.tools.timeout_secs);
        Ok(Self::new(provider, Arc::new(tools), config.agent.max_steps))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    provider: String,
    model: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/chat", post(handle_chat))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_http_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    tracing::info!(
        "Using provider {} with model {} (native streaming: {})",
        state.provider.name(),
        state.provider.model(),
        state.provider.supports_streaming()
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: format!(
            "{} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("STREAMCHAT_GIT_HASH")
        ),
        provider: state.provider.name().to_string(),
        model: state.provider.model().to_string(),
    })
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".into()));
    }
    let history = convert_to_model_messages(&request.messages);
    if history.is_empty() {
        return Err(ApiError::BadRequest(
            "messages contain nothing to send to the model".into(),
        ));
    }

    tracing::info!(
        messages = request.messages.len(),
        chat_id = request.id.as_deref().unwrap_or("-"),
        "Chat request"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = state.runner.clone();
    let task = tokio::spawn(async move {
        let result = runner.run(history, tx).await;
        if let Ok(summary) = &result {
            tracing::info!(
                steps = summary.steps,
                tool_calls = summary.tool_calls_made,
                cancelled = summary.cancelled,
                failed = summary.failed,
                "Chat request finished"
            );
        }
        result
    });

    // Nothing is committed to the client until the first chunk exists, so a
    // provider that fails up front still gets a JSON error response
    let first = match rx.recv().await {
        Some(chunk) => chunk,
        None => {
            return match task.await {
                Ok(Ok(_)) => Ok(ui_stream_response(
                    stream::empty::<UiStreamChunk>(),
                    future::ready(None),
                )),
                Ok(Err(e)) => Err(ApiError::Provider(e)),
                Err(e) => Err(ApiError::Provider(
                    anyhow::Error::new(e).context("Chat task failed"),
                )),
            };
        }
    };

    let chunks = stream::once(async move { first }).chain(UnboundedReceiverStream::new(rx));
    Ok(ui_stream_response(chunks, run_outcome(task)))
}

/// How a run that already streamed output ended
///
/// `None` when it completed; otherwise the chunk that replaces `[DONE]`.
async fn run_outcome(task: JoinHandle<Result<RunSummary>>) -> Option<UiStreamChunk> {
    let failure = match task.await {
        Ok(Ok(_)) => return None,
        Ok(Err(e)) => e,
        Err(e) => anyhow::Error::new(e).context("Chat task failed"),
    };
    tracing::error!("Chat run aborted after streaming started: {:#}", failure);
    Some(UiStreamChunk::Error {
        error_text: STREAM_ABORTED_TEXT.to_string(),
    })
}

/// SSE body: one `data:` event per chunk, then `[DONE]` if the run completed
/// or a final `error` chunk if it did not
fn ui_stream_response<S, F>(chunks: S, outcome: F) -> Response
where
    S: Stream<Item = UiStreamChunk> + Send + 'static,
    F: Future<Output = Option<UiStreamChunk>> + Send + 'static,
{
    let tail = stream::once(outcome).map(|failure| match failure {
        None => Ok(Event::default().data(DONE_MARKER)),
        Some(chunk) => Event::default().json_data(chunk),
    });
    let events = chunks
        .map(|chunk| Event::default().json_data(chunk))
        .chain(tail);

    (
        [(UI_STREAM_HEADER, UI_STREAM_VERSION)],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}
