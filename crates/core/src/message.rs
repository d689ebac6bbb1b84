//! Message and conversation-state domain types.
//!
//! These are the core value objects that flow through the entire system:
//! caller submits a message → store appends it → agent loop processes it →
//! provider and tools extend the transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque, caller-supplied identifier for a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    /// Generate a fresh random thread id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Set on tool results that carry a failure payload
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create an assistant message that proposes tool calls.
    pub fn assistant_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<MessageToolCall>,
    ) -> Self {
        let mut msg = Self::new(Role::Assistant, content.into());
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg.is_error = is_error;
        msg
    }

    /// Whether this is an assistant message that proposes tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as proposed by the model
    pub arguments: serde_json::Value,
}

/// Per-thread conversation state: the ordered transcript plus a scratch map
/// of the most recent output of each tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: ThreadId,

    /// Ordered, append-only messages
    pub messages: Vec<Message>,

    /// Most recent successful output per tool name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_outputs: BTreeMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a new empty state for a thread.
    pub fn new(thread_id: ThreadId) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            messages: Vec::new(),
            tool_outputs: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the transcript.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Record the latest output of a tool.
    pub fn set_tool_output(&mut self, tool_name: impl Into<String>, output: serde_json::Value) {
        self.updated_at = Utc::now();
        self.tool_outputs.insert(tool_name.into(), output);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool call ids proposed by assistant messages that have no tool result yet.
    pub fn unresolved_tool_calls(&self) -> Vec<&str> {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter().map(|tc| tc.id.as_str()))
            .filter(|id| {
                !self
                    .messages
                    .iter()
                    .any(|m| m.tool_call_id.as_deref() == Some(*id))
            })
            .collect()
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
        assert!(!msg.is_error);
    }

    #[test]
    fn state_tracks_updates() {
        let mut state = ConversationState::new(ThreadId::from("t-1"));
        let created = state.created_at;

        state.push(Message::user("First message"));
        assert_eq!(state.len(), 1);
        assert!(state.updated_at >= created);
    }

    #[test]
    fn tool_result_serialization_keeps_error_flag() {
        let msg = Message::tool_result("call_1", r#"{"error":"boom"}"#, true);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""is_error":true"#));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_call_id.as_deref(), Some("call_1"));
        assert!(back.is_error);

        let ok = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!ok.contains("is_error"));
    }

    #[test]
    fn unresolved_tool_calls_are_reported() {
        let mut state = ConversationState::new(ThreadId::from("t-2"));
        state.push(Message::assistant_tool_calls(
            "",
            vec![
                MessageToolCall {
                    id: "a".into(),
                    name: "web_search".into(),
                    arguments: serde_json::json!({"query": "x"}),
                },
                MessageToolCall {
                    id: "b".into(),
                    name: "web_search".into(),
                    arguments: serde_json::json!({"query": "y"}),
                },
            ],
        ));
        state.push(Message::tool_result("a", "[]", false));
        assert_eq!(state.unresolved_tool_calls(), vec!["b"]);
    }

    #[test]
    fn thread_id_is_transparent_in_json() {
        let id = ThreadId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""abc""#);
    }
}
