//! In-memory conversation store — fast, ephemeral, process-local.
//!
//! Each thread's state sits behind its own mutex, so appends on one thread
//! never wait on another. The outer map lock is held only long enough to find
//! or create a slot.

use async_trait::async_trait;
use concierge_core::error::StoreError;
use concierge_core::message::{ConversationState, Message, ThreadId};
use concierge_core::store::{ConversationStore, TurnLease, TurnLocks};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

type Slot = Arc<Mutex<ConversationState>>;

#[derive(Default)]
pub struct InMemoryConversationStore {
    threads: RwLock<HashMap<ThreadId, Slot>>,
    turns: TurnLocks,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, thread_id: &ThreadId) -> Slot {
        if let Some(slot) = self.threads.read().await.get(thread_id) {
            return slot.clone();
        }
        self.threads
            .write()
            .await
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new(thread_id.clone()))))
            .clone()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<ConversationState, StoreError> {
        let slot = self.slot(thread_id).await;
        let state = slot.lock().await;
        Ok(state.clone())
    }

    async fn append(&self, thread_id: &ThreadId, message: Message) -> Result<(), StoreError> {
        let slot = self.slot(thread_id).await;
        let mut state = slot.lock().await;
        trace!(%thread_id, role = ?message.role, position = state.len(), "append");
        state.push(message);
        Ok(())
    }

    async fn record_tool_output(
        &self,
        thread_id: &ThreadId,
        tool_name: &str,
        output: serde_json::Value,
    ) -> Result<(), StoreError> {
        let slot = self.slot(thread_id).await;
        slot.lock().await.set_tool_output(tool_name, output);
        Ok(())
    }

    async fn lease(&self, thread_id: &ThreadId) -> Result<TurnLease, StoreError> {
        self.turns.acquire(thread_id).await
    }

    async fn threads(&self) -> Result<Vec<ThreadId>, StoreError> {
        let mut ids: Vec<ThreadId> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn contains(&self, thread_id: &ThreadId) -> Result<bool, StoreError> {
        Ok(self.threads.read().await.contains_key(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_creates_empty_state() {
        let store = InMemoryConversationStore::new();
        let state = store.get(&ThreadId::from("new")).await.unwrap();
        assert!(state.is_empty());
        assert_eq!(state.thread_id.as_str(), "new");
        assert_eq!(store.threads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_n_then_read_back_identical() {
        let store = InMemoryConversationStore::new();
        let t = ThreadId::from("t");
        let mut sent = Vec::new();
        for i in 0..50 {
            let msg = if i % 2 == 0 {
                Message::user(format!("question {i}"))
            } else {
                Message::assistant(format!("answer {i}"))
            };
            sent.push(msg.clone());
            store.append(&t, msg).await.unwrap();
        }
        let state = store.get(&t).await.unwrap();
        assert_eq!(state.messages, sent);
    }

    #[tokio::test]
    async fn concurrent_appends_lose_nothing() {
        let store = Arc::new(InMemoryConversationStore::new());
        let t = ThreadId::from("busy");
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let t = t.clone();
            handles.push(tokio::spawn(async move {
                store.append(&t, Message::user(format!("m{i}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let state = store.get(&t).await.unwrap();
        assert_eq!(state.len(), 32);
        let mut ids: Vec<_> = state.messages.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = InMemoryConversationStore::new();
        let a = ThreadId::from("a");
        let b = ThreadId::from("b");
        store.append(&a, Message::user("for a")).await.unwrap();
        store.append(&b, Message::user("for b")).await.unwrap();
        store
            .record_tool_output(&a, "web_search", serde_json::json!({"hits": []}))
            .await
            .unwrap();

        let sa = store.get(&a).await.unwrap();
        let sb = store.get(&b).await.unwrap();
        assert_eq!(sa.messages[0].content, "for a");
        assert_eq!(sb.messages[0].content, "for b");
        assert!(sa.tool_outputs.contains_key("web_search"));
        assert!(sb.tool_outputs.is_empty());
    }

    #[tokio::test]
    async fn contains_does_not_create() {
        let store = InMemoryConversationStore::new();
        let t = ThreadId::from("t");
        assert!(!store.contains(&t).await.unwrap());
        assert!(store.threads().await.unwrap().is_empty());

        store.append(&t, Message::user("hi")).await.unwrap();
        assert!(store.contains(&t).await.unwrap());
    }
}
