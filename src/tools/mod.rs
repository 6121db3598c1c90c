//! Tools the model may call mid-turn
//!
//! A tool is a named, schema-typed function. The registry validates the
//! model's arguments against the tool's input schema before running it and
//! checks successful output against its output schema. Every failure
//! (unknown tool, bad arguments, bad output, execution error, timeout, panic)
//! comes back as an error `ToolResult` so the conversation continues.

mod square_root;

pub use square_root::{round_to_places, SquareRootTool, MAX_DECIMAL_PLACES};

use crate::llm::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Result of executing a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    /// Structured output on success, a message string on failure
    pub output: Value,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::String(message.into()),
        }
    }

    /// Human-readable error text, present only for failures
    pub fn error_text(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(match &self.output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Content fed back to the model as the tool message
    pub fn to_model_content(&self) -> String {
        match self.error_text() {
            Some(err) => format!("Error: {}", err),
            None => self.output.to_string(),
        }
    }
}

/// Trait for model-callable tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// JSON schema for the arguments
    fn parameters(&self) -> Value;

    /// JSON schema for a successful output
    fn output_schema(&self) -> Value {
        serde_json::json!({})
    }

    /// Execute the tool with validated parameters
    async fn execute(&self, params: Value) -> Result<ToolResult>;

    /// Convert to LLM tool definition
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    tool_timeout_secs: u64,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            tool_timeout_secs: 30,
        }
    }

    /// Registry with every built-in tool
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SquareRootTool));
        registry
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        tracing::debug!("Registering tool: {}", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Get all tool definitions for the LLM, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Check arguments against a tool's input schema
    ///
    /// Returns every violation joined into one message.
    pub fn validate_arguments(&self, name: &str, arguments: &Value) -> Result<(), String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("Unknown tool: {}", name))?;

        validate_against(name, &tool.parameters(), arguments)
    }

    /// Validate and execute a tool by name
    pub async fn execute(&self, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!("Model requested unknown tool: {}", name);
            return ToolResult::error(format!("Unknown tool: {}", name));
        };

        if let Err(message) = self.validate_arguments(name, &params) {
            tracing::info!("Rejected arguments for '{}': {}", name, message);
            return ToolResult::error(format!("Invalid input: {}", message));
        }

        // Timeout + panic recovery so a faulty tool never takes the request down
        let timeout_duration = Duration::from_secs(self.tool_timeout_secs);
        match timeout(
            timeout_duration,
            AssertUnwindSafe(tool.execute(params)).catch_unwind(),
        )
        .await
        {
            Ok(Ok(Ok(result))) if result.success => {
                match validate_against(name, &tool.output_schema(), &result.output) {
                    Ok(()) => result,
                    Err(message) => {
                        tracing::warn!("Tool '{}' output does not match its schema: {}", name, message);
                        ToolResult::error(format!("Invalid output from '{}': {}", name, message))
                    }
                }
            }
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                tracing::warn!("Tool '{}' failed: {}", name, e);
                ToolResult::error(format!("Tool '{}' failed: {}", name, e))
            }
            Ok(Err(panic_info)) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                tracing::error!("Tool '{}' panicked: {}", name, panic_msg);
                ToolResult::error(format!("Tool '{}' crashed: {}", name, panic_msg))
            }
            Err(_) => ToolResult::error(format!(
                "Tool '{}' timed out after {} seconds",
                name, self.tool_timeout_secs
            )),
        }
    }
}

/// Every violation of `schema` by `value`, joined into one message
fn validate_against(tool_name: &str, schema: &Value, value: &Value) -> Result<(), String> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| format!("Invalid schema for tool '{}': {}", tool_name, e))?;

    if let Err(errors) = compiled.validate(value) {
        let messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        return Err(messages.join("; "));
    }

    Ok(())
}
