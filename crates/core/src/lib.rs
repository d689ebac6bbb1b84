//! # Concierge Core
//!
//! Domain types, traits, and error definitions for the Concierge agent runtime.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! Every collaborator (language model, conversation store, record store,
//! search providers, tools) is a trait here. Implementations live in their
//! respective crates, so tests can swap in scripted mocks.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod records;
pub mod retry;
pub mod search;
pub mod store;
pub mod tool;
pub mod validation;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationState, Message, MessageToolCall, Role, ThreadId};
pub use provider::{GenerationConfig, Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use records::{Restaurant, RestaurantFilter, RestaurantStore};
pub use retry::RetryPolicy;
pub use search::{PlaceSearch, WebSearch};
pub use store::{ConversationStore, TurnLease, TurnLocks};
pub use tool::{SideEffect, Tool, ToolCall, ToolFailure, ToolOutcome, ToolRegistry, ToolResult};
