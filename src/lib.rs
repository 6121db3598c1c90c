//! streamchat: streaming chat server and client with model-invoked tools
//!
//! This library provides:
//! - `POST /api/chat`, relaying a conversation to an LLM provider and
//!   streaming the reply back as UI message chunks
//! - A multi-step runner that executes the tools the model asks for
//! - The `squareRoot` tool
//! - The chat front-end model: messages, sessions, auto-continuation and
//!   part rendering, used by the terminal client

pub mod agent;
pub mod config;
pub mod llm;
pub mod tools;
pub mod transport;
pub mod ui;

pub use config::Config;
