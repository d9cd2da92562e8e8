//! Thread state persistence
//!
//! Conversation state is stored per thread id. The store also hands out the
//! per-thread lock that serializes requests on the same thread.

use crate::models::ConversationState;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

pub mod postgres;
pub use postgres::PgThreadStore;

/// Trait for thread state persistence
#[async_trait::async_trait]
pub trait ThreadStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationState>>;

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()>;

    /// Exclusive access to one thread for the duration of a request
    async fn lock(&self, thread_id: &str) -> OwnedMutexGuard<()>;

    /// Stored state, or a fresh one for an unknown thread
    async fn load(&self, thread_id: &str) -> Result<ConversationState> {
        Ok(self.get(thread_id).await?.unwrap_or_default())
    }
}

/// One async mutex per thread id. Different threads never contend.
#[derive(Default)]
pub struct ThreadLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only the map still references have no holder or waiter
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// In-memory thread store for development
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<String, ConversationState>>>,
    locks: ThreadLocks,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn get(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.insert(thread_id.to_string(), state.clone());
        Ok(())
    }

    async fn lock(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(thread_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_load_defaults_for_unknown_thread() {
        let store = InMemoryThreadStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert_eq!(store.load("missing").await.unwrap(), ConversationState::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemoryThreadStore::new();
        let mut state = ConversationState::default();
        state.begin_turn("hello");

        store.save("t1", &state).await.unwrap();
        assert_eq!(store.load("t1").await.unwrap(), state);
        assert!(store.get("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_thread_lock_is_exclusive() {
        let locks = ThreadLocks::new();
        let guard = locks.acquire("t1").await;

        // A different thread id is free
        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("t2")).await;
        assert!(other.is_ok());

        // The same thread id waits
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("t1")).await;
        assert!(same.is_err());

        drop(guard);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("t1")).await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn test_idle_thread_locks_are_released() {
        let locks = ThreadLocks::new();
        for i in 0..100 {
            drop(locks.acquire(&format!("thread-{}", i)).await);
        }
        drop(locks.acquire("last").await);
        assert_eq!(locks.locks.lock().await.len(), 1);

        // A held lock survives pruning and still excludes
        let held = locks.acquire("busy").await;
        drop(locks.acquire("other").await);
        let _next = locks.acquire("another").await;
        assert!(locks.locks.lock().await.contains_key("busy"));
        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("busy")).await;
        assert!(same.is_err());
        drop(held);
    }
}
