//! In-memory session store

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use anyhow::Result;
use syncward_core::{domain::Session, ports::ISessionStore};

/// [`ISessionStore`] that keeps the collection in memory
///
/// Counts saves so callers can assert that a mutation was persisted.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<Session>>,
    saves: AtomicUsize,
    paused: AtomicBool,
}

impl MemorySessionStore {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            saves: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
        }
    }

    /// Snapshot of the stored collection
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Number of completed `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl ISessionStore for MemorySessionStore {
    async fn load(&self) -> Vec<Session> {
        self.snapshot()
    }

    async fn save(&self, sessions: &[Session]) -> Result<()> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?;
        *guard = sessions.to_vec();
        self.saves.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn load_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    async fn save_paused(&self, paused: bool) -> Result<()> {
        self.paused.store(paused, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_replaces_and_counts() {
        let store = MemorySessionStore::default();
        assert!(store.load().await.is_empty());

        store.save(&[Session::new("a", "/a")]).await.unwrap();
        store.save(&[Session::new("b", "/b"), Session::new("c", "/c")]).await.unwrap();

        assert_eq!(store.load().await.len(), 2);
        assert_eq!(store.save_count(), 2);
    }
}
