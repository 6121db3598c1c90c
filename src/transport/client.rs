//! Terminal chat client for a running server

use crate::llm::streaming::SseDecoder;
use crate::ui::render::{render_error_banner, render_message, Rendered};
use crate::ui::{
    render_tool_part, ChatRequest, ChatSession, RenderOptions, UiRole, UiStreamChunk,
};
use anyhow::{Context, Result};
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;

/// Longest silence tolerated between stream chunks
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

const INCOMPLETE_RESPONSE_TEXT: &str = "The response ended before it was complete";

/// Automatic resubmissions allowed per user message
const MAX_CONTINUATIONS: usize = 5;

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// `GET /health` of the server
    pub async fn health(&self) -> Result<serde_json::Value> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Could not reach {}", url))?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Submit `text` and keep resubmitting while tool results need an answer
    ///
    /// Returns the number of requests sent; zero when the session refused the
    /// input (blank, or a response still in flight).
    pub async fn run_turn<F>(
        &self,
        session: &mut ChatSession,
        text: &str,
        mut on_chunk: F,
    ) -> Result<usize>
    where
        F: FnMut(&UiStreamChunk, &ChatSession),
    {
        session.set_draft_input(text);
        let Some(mut request) = session.submit_draft() else {
            return Ok(0);
        };

        let mut sent = 0;
        loop {
            sent += 1;
            self.send(session, request, &mut on_chunk).await?;

            if session.last_error().is_some() {
                break;
            }
            if sent > MAX_CONTINUATIONS {
                tracing::warn!("Stopping after {} automatic continuations", MAX_CONTINUATIONS);
                break;
            }
            match session.continuation_request() {
                Some(next) => {
                    tracing::debug!("Tool results complete, continuing");
                    request = next;
                }
                None => break,
            }
        }

        Ok(sent)
    }

    /// Send one request and fold the streamed reply into the session
    pub async fn send<F>(
        &self,
        session: &mut ChatSession,
        request: ChatRequest,
        mut on_chunk: F,
    ) -> Result<()>
    where
        F: FnMut(&UiStreamChunk, &ChatSession),
    {
        let endpoint = self.endpoint();
        let response = match self.http.post(&endpoint).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                session.fail(format!("Could not reach {}", endpoint));
                return Err(e).with_context(|| format!("POST {} failed", endpoint));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error")?.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status));
            session.fail(message.clone());
            anyhow::bail!("Chat request failed ({}): {}", status, message);
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut done = false;

        while !done {
            let bytes = match timeout(STREAM_IDLE_TIMEOUT, stream.next()).await {
                Ok(Some(Ok(bytes))) => bytes,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    session.fail("The response stream was interrupted");
                    return Err(e).context("Failed to read response stream");
                }
                Err(_) => {
                    session.fail("The server stopped responding");
                    anyhow::bail!(
                        "No data from server for {} seconds",
                        STREAM_IDLE_TIMEOUT.as_secs()
                    );
                }
            };

            for payload in decoder.push(&bytes) {
                done |= apply_payload(session, &payload, &mut on_chunk);
            }
        }
        for payload in decoder.finish() {
            done |= apply_payload(session, &payload, &mut on_chunk);
        }

        if !done {
            // An `error` chunk already explains the cut; keep its text
            if let Some(error) = session.last_error().map(str::to_string) {
                session.fail(error);
                return Ok(());
            }
            session.fail(INCOMPLETE_RESPONSE_TEXT);
            anyhow::bail!("Response stream ended before [DONE]");
        }

        session.finish();
        Ok(())
    }
}

/// Apply one SSE payload; true once the terminator arrives
fn apply_payload<F>(session: &mut ChatSession, payload: &str, on_chunk: &mut F) -> bool
where
    F: FnMut(&UiStreamChunk, &ChatSession),
{
    match UiStreamChunk::from_payload(payload) {
        None => true,
        Some(Ok(chunk)) => {
            session.apply_chunk(chunk.clone());
            on_chunk(&chunk, session);
            false
        }
        Some(Err(e)) => {
            tracing::warn!("Skipping unparseable chunk: {}", e);
            false
        }
    }
}

/// Prints a streaming reply as it arrives
pub struct TerminalPrinter {
    options: RenderOptions,
}

impl TerminalPrinter {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn print_chunk(&self, chunk: &UiStreamChunk, session: &ChatSession) {
        let mut stdout = std::io::stdout();
        match chunk {
            UiStreamChunk::TextDelta { delta, .. } => {
                print!("{}", delta);
            }
            UiStreamChunk::TextEnd { .. } => println!(),
            UiStreamChunk::ToolInputAvailable { tool_call_id, .. }
            | UiStreamChunk::ToolOutputAvailable { tool_call_id, .. }
            | UiStreamChunk::ToolOutputError { tool_call_id, .. } => {
                let rendered = session
                    .messages()
                    .last()
                    .and_then(|m| m.tool_part(tool_call_id))
                    .map(|tool| render_tool_part(tool, &self.options))
                    .and_then(|r| r.to_terminal());
                if let Some(line) = rendered {
                    println!("{}", line);
                }
            }
            UiStreamChunk::Error { error_text } => {
                println!("{}", render_error_banner(error_text));
            }
            _ => {}
        }
        let _ = stdout.flush();
    }
}

/// Every visible part of the conversation so far, labelled by speaker
pub fn transcript(session: &ChatSession, options: &RenderOptions) -> Vec<(UiRole, Rendered)> {
    session
        .messages()
        .iter()
        .flat_map(|message| {
            render_message(message, options)
                .into_iter()
                .map(move |rendered| (message.role, rendered))
        })
        .collect()
}

/// Interactive loop: one line of input per user message
pub async fn run_chat(url: &str) -> Result<()> {
    let client = ChatClient::new(url)?;
    match client.health().await {
        Ok(health) => println!(
            "{} {} {}",
            "Connected to".dimmed(),
            url.green(),
            format!(
                "({} / {})",
                health["provider"].as_str().unwrap_or("?"),
                health["model"].as_str().unwrap_or("?")
            )
            .dimmed()
        ),
        Err(e) => tracing::warn!("Health check failed: {:#}", e),
    }
    println!(
        "{}",
        "Type a message, 'history' to replay the conversation, or 'exit' to quit.".dimmed()
    );

    let printer = TerminalPrinter::new(RenderOptions {
        show_progress: true,
    });
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("{} ", ">".green().bold());
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "history" => {
                print_transcript(&session, &printer.options);
                continue;
            }
            _ => {}
        }

        if let Err(e) = client
            .run_turn(&mut session, input, |chunk, s| printer.print_chunk(chunk, s))
            .await
        {
            tracing::debug!("Turn failed: {:#}", e);
            let message = session.last_error().unwrap_or("request failed").to_string();
            println!("{}", render_error_banner(&message));
        }
        println!();
    }

    Ok(())
}

fn print_transcript(session: &ChatSession, options: &RenderOptions) {
    for (role, rendered) in transcript(session, options) {
        let speaker = match role {
            UiRole::User => "you".green().bold(),
            UiRole::Assistant => "assistant".cyan().bold(),
            UiRole::System => "system".dimmed(),
        };
        if let Some(line) = rendered.to_terminal() {
            println!("{} {}", speaker, line);
        }
    }
}
