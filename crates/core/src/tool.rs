//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the concierge the ability to act in the world:
//! search for places, look up details, query the web, and read or write
//! the restaurant record store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::error::{ErrorKind, ToolError};
use crate::message::{Message, MessageToolCall};
use crate::provider::ToolDefinition;

/// Declared side-effect class of a tool.
///
/// The dispatcher may run reads and searches concurrently; persistent writes
/// always run one at a time in proposal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    IdempotentRead,
    NetworkSearch,
    PersistentWrite,
}

impl SideEffect {
    pub fn is_parallel_safe(self) -> bool {
        !matches!(self, Self::PersistentWrite)
    }
}

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,

    /// ID of the assistant message that proposed this call
    pub message_id: String,
}

impl ToolCall {
    /// Extract the proposed calls from an assistant message, in order.
    pub fn from_message(message: &Message) -> Vec<Self> {
        message
            .tool_calls
            .iter()
            .map(|tc: &MessageToolCall| Self {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: tc.arguments.clone(),
                message_id: message.id.clone(),
            })
            .collect()
    }
}

/// Typed failure description carried by a failed tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    /// One of `validation`, `timeout`, `tool_execution`
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(serde_json::Value),
    Failure(ToolFailure),
}

/// The result of a tool execution. Resolves exactly one [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    pub tool_name: String,

    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call: &ToolCall, payload: serde_json::Value) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Success(payload),
        }
    }

    pub fn failure(call: &ToolCall, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Failure(ToolFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Map a tool error onto a failed result with the matching kind.
    pub fn from_error(call: &ToolCall, error: &ToolError) -> Self {
        let kind = match error {
            ToolError::NotFound(_) | ToolError::InvalidArguments(_) => ErrorKind::Validation,
            ToolError::Timeout { .. } => ErrorKind::Timeout,
            ToolError::ExecutionFailed { .. } => ErrorKind::ToolExecution,
        };
        Self::failure(call, kind, error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Failure(f) => Some(f.kind),
        }
    }

    /// Render as a transcript entry for the model to read.
    pub fn to_message(&self) -> Message {
        match &self.outcome {
            ToolOutcome::Success(serde_json::Value::String(text)) => {
                Message::tool_result(&self.call_id, text.clone(), false)
            }
            ToolOutcome::Success(value) => {
                Message::tool_result(&self.call_id, value.to_string(), false)
            }
            ToolOutcome::Failure(failure) => {
                let body = serde_json::json!({
                    "error": failure.kind,
                    "message": failure.message,
                });
                Message::tool_result(&self.call_id, body.to_string(), true)
            }
        }
    }
}

/// The core Tool trait.
///
/// Each concierge capability implements this trait. Tools are registered in
/// the ToolRegistry and handed to the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_restaurants").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    fn side_effect(&self) -> SideEffect;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, assembled once at startup.
///
/// The agent uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up tools when the LLM requests them
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
