//! Turn-level stream chunks.
//!
//! A turn produces zero or more `message` chunks (assistant tool-call
//! messages and tool results, in transcript order) followed by exactly one
//! terminal chunk: `final` or `error`.

use concierge_core::error::{Error, ErrorKind};
use concierge_core::message::{Message, ThreadId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnChunk {
    /// A transcript entry appended during the turn.
    Message { thread_id: ThreadId, message: Message },

    /// The turn finished with an answer.
    Final {
        thread_id: ThreadId,
        content: String,
        iterations: u32,
    },

    /// The turn ended with an error. The transcript up to this point is kept.
    Error {
        thread_id: ThreadId,
        kind: ErrorKind,
        message: String,
    },
}

impl TurnChunk {
    pub fn error(thread_id: &ThreadId, error: &Error) -> Self {
        Self::Error {
            thread_id: thread_id.clone(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Self::Message { thread_id, .. } | Self::Final { thread_id, .. } | Self::Error { thread_id, .. } => {
                thread_id
            }
        }
    }

    /// Text a chat client would show for this chunk.
    pub fn content(&self) -> &str {
        match self {
            Self::Message { message, .. } => &message.content,
            Self::Final { content, .. } => content,
            Self::Error { message, .. } => message,
        }
    }

    /// SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Message { .. })
    }
}
