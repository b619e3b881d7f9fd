//! Working copy of the session collection
//!
//! The registry is the scheduler's single source of truth at runtime. Every
//! mutation goes through it and is followed by a full save of the collection
//! through the [`ISessionStore`] port.
//!
//! The save lock is held from a mutation until its save has finished, and
//! wholesale replacements (reloads after an external edit) take the same
//! lock. A reload therefore never lands between a mutation and its save, and
//! a reload read from an older file never rolls back a newer sync outcome.

use std::sync::{Arc, PoisonError, RwLock};

use syncward_core::{
    domain::{Session, SessionId},
    ports::ISessionStore,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::SyncError;

/// Shared working copy of all sessions, backed by a session store
pub struct SessionRegistry {
    sessions: RwLock<Vec<Session>>,
    store: Arc<dyn ISessionStore>,
    save_lock: Mutex<()>,
}

impl SessionRegistry {
    /// Creates an empty registry; call [`load`](Self::load) to populate it
    pub fn new(store: Arc<dyn ISessionStore>) -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            store,
            save_lock: Mutex::new(()),
        }
    }

    /// Replaces the working copy with the stored collection
    pub async fn load(&self) -> Vec<Session> {
        let _guard = self.save_lock.lock().await;
        let sessions = self.store.load().await;
        debug!(count = sessions.len(), "Session registry loaded");
        self.replace(sessions.clone());
        sessions
    }

    /// Snapshot of the working copy
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| &s.id == id)
            .cloned()
    }

    /// Looks a session up by id, falling back to an exact name match
    pub fn find(&self, id_or_name: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .iter()
            .find(|s| s.id.as_str() == id_or_name)
            .or_else(|| sessions.iter().find(|s| s.name == id_or_name))
            .cloned()
    }

    /// Returns the pause flag of a session, `false` if it does not exist
    pub fn is_session_paused(&self, id: &SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|s| &s.id == id && s.paused)
    }

    /// Replaces the working copy wholesale without persisting
    pub fn replace(&self, sessions: Vec<Session>) {
        *self.sessions.write().unwrap_or_else(PoisonError::into_inner) = sessions;
    }

    /// Replaces the working copy, reporting whether any session definition changed
    ///
    /// Changes to pause flags and last-sync bookkeeping do not count: they
    /// never require watchers to be re-armed. A session whose working copy
    /// holds a more recent sync outcome than `sessions` keeps that outcome.
    pub async fn replace_if_changed(&self, sessions: Vec<Session>) -> bool {
        let _guard = self.save_lock.lock().await;
        self.apply_replacement(sessions)
    }

    /// Re-reads the store and applies it like [`replace_if_changed`](Self::replace_if_changed)
    pub async fn reload_if_changed(&self) -> bool {
        let _guard = self.save_lock.lock().await;
        let sessions = self.store.load().await;
        self.apply_replacement(sessions)
    }

    /// Must be called with the save lock held
    fn apply_replacement(&self, mut sessions: Vec<Session>) -> bool {
        let mut current = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        for incoming in &mut sessions {
            if let Some(existing) = current.iter().find(|s| s.id == incoming.id) {
                keep_newer_outcome(incoming, existing);
            }
        }
        let changed = current.len() != sessions.len()
            || current
                .iter()
                .zip(sessions.iter())
                .any(|(a, b)| !a.same_definition(b));
        *current = sessions;
        changed
    }

    /// Applies `f` to the session with `id` and persists the collection
    ///
    /// # Errors
    /// [`SyncError::NotFound`] if no such session exists, [`SyncError::Store`]
    /// if the collection could not be saved.
    pub async fn update<F>(&self, id: &SessionId, f: F) -> Result<Session, SyncError>
    where
        F: FnOnce(&mut Session),
    {
        let _guard = self.save_lock.lock().await;
        let updated = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let session = sessions
                .iter_mut()
                .find(|s| &s.id == id)
                .ok_or_else(|| SyncError::NotFound(id.clone()))?;
            f(session);
            session.clone()
        };
        self.save_locked().await?;
        Ok(updated)
    }

    /// Inserts or replaces a session (matched by id) and persists
    pub async fn upsert(&self, session: Session) -> Result<(), SyncError> {
        let _guard = self.save_lock.lock().await;
        {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            match sessions.iter_mut().find(|s| s.id == session.id) {
                Some(existing) => *existing = session,
                None => sessions.push(session),
            }
        }
        self.save_locked().await
    }

    /// Removes a session and persists
    pub async fn remove(&self, id: &SessionId) -> Result<Session, SyncError> {
        let _guard = self.save_lock.lock().await;
        let removed = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let index = sessions
                .iter()
                .position(|s| &s.id == id)
                .ok_or_else(|| SyncError::NotFound(id.clone()))?;
            sessions.remove(index)
        };
        self.save_locked().await?;
        Ok(removed)
    }

    /// Saves the working copy; must be called with the save lock held
    async fn save_locked(&self) -> Result<(), SyncError> {
        let snapshot = self.snapshot();
        self.store
            .save(&snapshot)
            .await
            .map_err(|e| SyncError::Store(format!("{e:#}")))
    }

    /// Reads the persisted global pause flag
    pub async fn load_global_pause(&self) -> bool {
        self.store.load_paused().await
    }

    pub async fn save_global_pause(&self, paused: bool) -> Result<(), SyncError> {
        self.store
            .save_paused(paused)
            .await
            .map_err(|e| SyncError::Store(format!("{e:#}")))
    }
}

/// Copies the last-sync bookkeeping of `existing` onto `incoming` when it is newer
fn keep_newer_outcome(incoming: &mut Session, existing: &Session) {
    let existing_is_newer = match (existing.last_sync, incoming.last_sync) {
        (Some(ours), Some(theirs)) => ours > theirs,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if existing_is_newer {
        incoming.last_sync = existing.last_sync;
        incoming.last_sync_status = existing.last_sync_status;
        incoming.last_sync_error = existing.last_sync_error.clone();
    }
}
