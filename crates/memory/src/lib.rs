//! Storage implementations for Concierge.
//!
//! Conversation stores implement `concierge_core::ConversationStore`;
//! restaurant record stores implement `concierge_core::RestaurantStore`.

pub mod file_backend;
pub mod in_memory;
pub mod records;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileConversationStore;
pub use in_memory::InMemoryConversationStore;
pub use records::InMemoryRestaurantStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRestaurantStore;
