//! The concierge agent runtime.
//!
//! A turn flows through four pieces:
//!
//! 1. **[`TurnTransport`]** accepts `(thread_id, message)` and returns a stream
//! 2. **[`AgentLoop`]** takes the thread's lease and appends the user message
//! 3. **[`ModelGateway`]** sends the transcript to the model, with retries
//! 4. **[`ToolDispatcher`]** validates and runs proposed tool calls
//!
//! Steps 3 and 4 repeat until the model answers without tool calls or the
//! iteration cap is reached.

pub mod dispatcher;
pub mod loop_runner;
pub mod model_gateway;
pub mod stream_event;
pub mod transport;

pub use dispatcher::{Dispatched, ToolDispatcher};
pub use loop_runner::{AgentLoop, StepOutcome, TurnOutcome};
pub use model_gateway::{ModelGateway, ModelOutcome, ModelReply};
pub use stream_event::TurnChunk;
pub use transport::{TurnStream, TurnTransport};
