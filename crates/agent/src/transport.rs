//! Streaming transport.
//!
//! `submit_turn` returns immediately with a [`TurnStream`]. The turn runs on
//! its own task and pushes chunks through a bounded channel as the
//! transcript grows. A supervisor task owns the terminal chunk, so the stream
//! ends with exactly one `final` or `error` even if the turn task panics.
//! Dropping the stream aborts the turn.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use concierge_core::error::ErrorKind;
use concierge_core::message::ThreadId;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::loop_runner::AgentLoop;
use crate::stream_event::TurnChunk;

#[derive(Clone)]
pub struct TurnTransport {
    agent: Arc<AgentLoop>,
    buffer: usize,
}

impl TurnTransport {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self { agent, buffer: 32 }
    }

    /// Channel capacity between the turn task and the caller.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn agent(&self) -> &Arc<AgentLoop> {
        &self.agent
    }

    /// Start a turn on `thread_id` and stream its progress.
    pub fn submit_turn(&self, thread_id: ThreadId, user_message: impl Into<String>) -> TurnStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        let agent = self.agent.clone();
        let user_message = user_message.into();

        tokio::spawn(async move {
            let turn_tx = tx.clone();
            let turn_thread = thread_id.clone();
            let mut turn = tokio::spawn(async move {
                agent.execute_turn(&turn_thread, user_message, &turn_tx).await
            });

            let joined = tokio::select! {
                joined = &mut turn => joined,
                _ = tx.closed() => {
                    turn.abort();
                    warn!(thread_id = %thread_id, "Caller dropped the stream, turn aborted");
                    return;
                }
            };

            let terminal = match joined {
                Ok(Ok(done)) => TurnChunk::Final {
                    thread_id: thread_id.clone(),
                    content: done.content,
                    iterations: done.iterations,
                },
                Ok(Err(e)) => TurnChunk::error(&thread_id, &e),
                Err(join_error) => {
                    error!(thread_id = %thread_id, error = %join_error, "Turn task crashed");
                    TurnChunk::Error {
                        thread_id: thread_id.clone(),
                        kind: ErrorKind::Internal,
                        message: format!("turn task failed: {join_error}"),
                    }
                }
            };
            // The caller may already be gone; nothing left to do then.
            let _ = tx.send(terminal).await;
        });

        TurnStream { rx }
    }
}

/// Ordered chunks of one turn. Ends after the terminal chunk.
pub struct TurnStream {
    rx: mpsc::Receiver<TurnChunk>,
}

impl TurnStream {
    pub async fn next_chunk(&mut self) -> Option<TurnChunk> {
        self.rx.recv().await
    }

    /// Drain the stream to its end.
    pub async fn collect_all(mut self) -> Vec<TurnChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }
}

impl Stream for TurnStream {
    type Item = TurnChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
