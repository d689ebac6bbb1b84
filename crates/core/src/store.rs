//! Conversation state store — the per-thread memory substrate.
//!
//! The store exclusively owns per-thread state. The agent loop reaches it
//! only through this trait and holds a [`TurnLease`] while a turn runs, so
//! turns within one thread are serialized while distinct threads proceed in
//! parallel.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use crate::error::StoreError;
use crate::message::{ConversationState, Message, ThreadId};

type LockMap = Arc<Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>>;

/// Exclusive right to run a turn on one thread. Released on drop.
#[derive(Debug)]
pub struct TurnLease {
    thread_id: ThreadId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
}

impl TurnLease {
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }
}

impl Drop for TurnLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // With the guard gone, a count of one means only the map holds the
        // lock and nobody is queued on it.
        if let Ok(mut locks) = self.locks.lock() {
            if locks
                .get(&self.thread_id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(&self.thread_id);
            }
        }
    }
}

/// Per-thread turn locks, created lazily and dropped once no turn holds or
/// waits on them. Shared by store implementations.
#[derive(Debug, Default)]
pub struct TurnLocks {
    locks: LockMap,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other turn holds `thread_id`, then take the lease.
    pub async fn acquire(&self, thread_id: &ThreadId) -> Result<TurnLease, StoreError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| StoreError::Storage(format!("turn lock map poisoned: {e}")))?;
            locks.entry(thread_id.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        Ok(TurnLease {
            thread_id: thread_id.clone(),
            guard: Some(guard),
            locks: self.locks.clone(),
        })
    }
}

/// The conversation state store contract.
///
/// `append` is atomic and mutually exclusive per thread; reads observe every
/// append that completed before them on the same thread.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Current state of a thread. Creates an empty state on first access.
    async fn get(&self, thread_id: &ThreadId) -> Result<ConversationState, StoreError>;

    /// Append one message to the end of a thread's transcript.
    async fn append(&self, thread_id: &ThreadId, message: Message) -> Result<(), StoreError>;

    /// Overwrite the scratch entry holding a tool's most recent output.
    async fn record_tool_output(
        &self,
        thread_id: &ThreadId,
        tool_name: &str,
        output: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Take the per-thread turn lease, waiting for any running turn to finish.
    async fn lease(&self, thread_id: &ThreadId) -> Result<TurnLease, StoreError>;

    /// Threads known to the store.
    async fn threads(&self) -> Result<Vec<ThreadId>, StoreError>;

    /// Whether the thread exists, without creating it.
    async fn contains(&self, thread_id: &ThreadId) -> Result<bool, StoreError> {
        Ok(self.threads().await?.contains(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn lease_serializes_same_thread() {
        let locks = Arc::new(TurnLocks::new());
        let t = ThreadId::from("t");

        let first = locks.acquire(&t).await.unwrap();
        let locks2 = locks.clone();
        let t2 = t.clone();
        let waiter = tokio::spawn(async move { locks2.acquire(&t2).await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn leases_on_distinct_threads_do_not_block() {
        let locks = TurnLocks::new();
        let a = locks.acquire(&ThreadId::from("a")).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&ThreadId::from("b")),
        )
        .await
        .expect("distinct thread should not wait")
        .unwrap();
        assert_eq!(a.thread_id().as_str(), "a");
        assert_eq!(b.thread_id().as_str(), "b");
    }

    fn tracked(locks: &TurnLocks) -> usize {
        locks.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = TurnLocks::new();
        for i in 0..10 {
            let lease = locks.acquire(&ThreadId::from(format!("t{i}"))).await.unwrap();
            assert_eq!(tracked(&locks), 1);
            drop(lease);
        }
        assert_eq!(tracked(&locks), 0);
    }

    #[tokio::test]
    async fn lock_with_waiter_survives_release() {
        let locks = Arc::new(TurnLocks::new());
        let t = ThreadId::from("t");

        let first = locks.acquire(&t).await.unwrap();
        let locks2 = locks.clone();
        let t2 = t.clone();
        let waiter = tokio::spawn(async move { locks2.acquire(&t2).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        let second = waiter.await.unwrap().unwrap();
        assert_eq!(tracked(&locks), 1);

        // A third caller still queues behind the waiter's lease.
        let third = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&t)).await;
        assert!(third.is_err());

        drop(second);
        assert_eq!(tracked(&locks), 0);
    }
}
