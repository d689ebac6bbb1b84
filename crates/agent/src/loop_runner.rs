//! The agent loop.
//!
//! One turn moves through `MODEL_CALL → (TOOL_DISPATCH ⇄ MODEL_CALL)*` and
//! ends in FINALIZE (a final assistant message) or TERMINAL (an error). Every
//! transcript entry is appended to the store as soon as it exists, so a
//! terminal error leaves the work done so far in place.

use std::sync::Arc;

use chrono::Utc;
use concierge_config::AppConfig;
use concierge_core::error::{Error, ErrorKind, Result};
use concierge_core::event::{DomainEvent, EventBus};
use concierge_core::message::{Message, ThreadId};
use concierge_core::provider::Provider;
use concierge_core::store::{ConversationStore, TurnLease};
use concierge_core::tool::{ToolOutcome, ToolRegistry, ToolResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dispatcher::ToolDispatcher;
use crate::model_gateway::{ModelGateway, ModelOutcome};
use crate::stream_event::TurnChunk;

/// Result of one MODEL_CALL.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The model proposed tool calls; they were executed and appended.
    Continue {
        message: Message,
        results: Vec<ToolResult>,
    },
    /// The model answered.
    Final(Message),
}

/// A finished turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub content: String,
    /// Model calls made during the turn
    pub iterations: u32,
}

pub struct AgentLoop {
    gateway: ModelGateway,

    dispatcher: ToolDispatcher,

    store: Arc<dyn ConversationStore>,

    event_bus: Arc<EventBus>,

    /// Maximum model calls per turn
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        gateway: ModelGateway,
        dispatcher: ToolDispatcher,
        store: Arc<dyn ConversationStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            store,
            event_bus,
            max_iterations: 10,
        }
    }

    /// Wire a loop from configuration: generation settings, retry policy,
    /// tool timeout and iteration cap.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        store: Arc<dyn ConversationStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let gateway = ModelGateway::from_config(provider, config);
        let dispatcher = ToolDispatcher::new(tools).with_tool_timeout(config.agent.tool_timeout());
        Self::new(gateway, dispatcher, store, event_bus).with_max_iterations(config.agent.max_iterations)
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run a whole turn: take the thread's lease, append the user message,
    /// then loop until the turn finalizes or fails.
    ///
    /// Only `message` chunks are sent to `sink`; the terminal chunk belongs
    /// to the caller.
    pub async fn execute_turn(
        &self,
        thread_id: &ThreadId,
        user_message: String,
        sink: &mpsc::Sender<TurnChunk>,
    ) -> Result<TurnOutcome> {
        let lease = self.store.lease(thread_id).await?;
        self.begin_turn(&lease, user_message).await?;

        let outcome = self.run_turn(&lease, sink).await;
        let (iterations, kind) = match &outcome {
            Ok(done) => (done.iterations, None),
            Err(Error::BudgetExceeded { iterations }) => (*iterations, Some(ErrorKind::BudgetExceeded)),
            Err(e) => (0, Some(e.kind())),
        };
        self.event_bus.publish(DomainEvent::TurnFinished {
            thread_id: thread_id.clone(),
            iterations,
            error: kind,
            timestamp: Utc::now(),
        });
        outcome
    }

    /// Append the user message that opens a turn.
    ///
    /// Tool calls left unresolved by an aborted earlier turn get a cancelled
    /// result first, so the transcript stays well formed for the model.
    pub async fn begin_turn(&self, lease: &TurnLease, user_message: String) -> Result<()> {
        let thread_id = lease.thread_id();
        let state = self.store.get(thread_id).await?;

        for call_id in state.unresolved_tool_calls() {
            warn!(thread_id = %thread_id, call_id, "Resolving tool call interrupted by an aborted turn");
            let body = serde_json::json!({
                "error": ErrorKind::Cancelled,
                "message": "The turn was cancelled before this tool call completed",
            });
            self.store
                .append(thread_id, Message::tool_result(call_id, body.to_string(), true))
                .await?;
        }

        self.store.append(thread_id, Message::user(user_message)).await?;
        self.event_bus.publish(DomainEvent::TurnStarted {
            thread_id: thread_id.clone(),
            timestamp: Utc::now(),
        });
        info!(thread_id = %thread_id, messages = state.len() + 1, "Turn started");
        Ok(())
    }

    /// Drive MODEL_CALL / TOOL_DISPATCH until FINALIZE or TERMINAL.
    pub async fn run_turn(&self, lease: &TurnLease, sink: &mpsc::Sender<TurnChunk>) -> Result<TurnOutcome> {
        let thread_id = lease.thread_id();
        let mut iterations = 0;

        loop {
            if iterations >= self.max_iterations {
                warn!(thread_id = %thread_id, iterations, "Iteration cap reached");
                return Err(Error::BudgetExceeded { iterations });
            }
            iterations += 1;
            debug!(thread_id = %thread_id, iteration = iterations, "Agent loop iteration");

            match self.step(thread_id, iterations, sink).await {
                Ok(StepOutcome::Continue { .. }) => continue,
                Ok(StepOutcome::Final(message)) => {
                    info!(thread_id = %thread_id, iterations, "Turn finalized");
                    return Ok(TurnOutcome {
                        content: message.content,
                        iterations,
                    });
                }
                Err(e) => {
                    error!(thread_id = %thread_id, iteration = iterations, error = %e, "Turn failed");
                    return Err(e);
                }
            }
        }
    }

    /// One MODEL_CALL, plus the TOOL_DISPATCH it leads to.
    pub async fn step(
        &self,
        thread_id: &ThreadId,
        iteration: u32,
        sink: &mpsc::Sender<TurnChunk>,
    ) -> Result<StepOutcome> {
        let state = self.store.get(thread_id).await?;
        let reply = self
            .gateway
            .invoke(&state.messages, &self.dispatcher.definitions())
            .await?;

        let proposed = match &reply.outcome {
            ModelOutcome::Final(_) => 0,
            ModelOutcome::ToolCalls { calls, .. } => calls.len(),
        };
        self.event_bus.publish(DomainEvent::ModelInvoked {
            thread_id: thread_id.clone(),
            model: reply.model.clone(),
            iteration,
            tool_calls: proposed,
            tokens_used: reply.usage.as_ref().map_or(0, |u| u.total_tokens),
            timestamp: Utc::now(),
        });

        let (message, calls) = match reply.outcome {
            ModelOutcome::Final(message) => {
                self.store.append(thread_id, message.clone()).await?;
                return Ok(StepOutcome::Final(message));
            }
            ModelOutcome::ToolCalls { message, calls } => (message, calls),
        };

        self.store.append(thread_id, message.clone()).await?;
        self.emit(thread_id, message.clone(), sink).await?;

        let dispatched = self.dispatcher.dispatch(&calls).await;
        let mut results = Vec::with_capacity(dispatched.len());
        for d in dispatched {
            self.event_bus.publish(DomainEvent::ToolExecuted {
                thread_id: thread_id.clone(),
                tool_name: d.result.tool_name.clone(),
                success: d.result.is_success(),
                duration_ms: d.elapsed.as_millis() as u64,
                timestamp: Utc::now(),
            });

            if let ToolOutcome::Success(output) = &d.result.outcome {
                self.store
                    .record_tool_output(thread_id, &d.result.tool_name, output.clone())
                    .await?;
            }

            let entry = d.result.to_message();
            self.store.append(thread_id, entry.clone()).await?;
            self.emit(thread_id, entry, sink).await?;
            results.push(d.result);
        }

        Ok(StepOutcome::Continue { message, results })
    }

    async fn emit(&self, thread_id: &ThreadId, message: Message, sink: &mpsc::Sender<TurnChunk>) -> Result<()> {
        sink.send(TurnChunk::Message {
            thread_id: thread_id.clone(),
            message,
        })
        .await
        .map_err(|_| Error::Cancelled("stream receiver dropped".into()))
    }
}
