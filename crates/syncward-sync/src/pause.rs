//! Pause controller
//!
//! Two gates decide whether a trigger may start a sync: one global flag, and
//! the `paused` flag of each session, which lives in the registry and is
//! persisted with the collection. The global flag is persisted on its own by
//! the controller, so flipping it never touches session flags. Manual syncs
//! ignore both.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use syncward_core::domain::SessionId;
use tracing::info;

use crate::{registry::SessionRegistry, SyncError};

/// Global and per-session pause gates
pub struct PauseController {
    global: AtomicBool,
    registry: Arc<SessionRegistry>,
}

impl PauseController {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            global: AtomicBool::new(false),
            registry,
        }
    }

    /// Pauses every trigger-initiated sync
    pub fn pause_all(&self) {
        if !self.global.swap(true, Ordering::AcqRel) {
            info!("All sessions paused");
        }
    }

    pub fn resume_all(&self) {
        if self.global.swap(false, Ordering::AcqRel) {
            info!("All sessions resumed");
        }
    }

    /// Sets the global gate to a previously persisted value
    pub fn set_global(&self, paused: bool) {
        if paused {
            self.pause_all();
        } else {
            self.resume_all();
        }
    }

    pub fn is_globally_paused(&self) -> bool {
        self.global.load(Ordering::Acquire)
    }

    /// Pauses one session and persists the flag
    ///
    /// # Errors
    /// [`SyncError::NotFound`] for an unknown id, [`SyncError::Store`] if
    /// the collection could not be saved.
    pub async fn pause_session(&self, id: &SessionId) -> Result<(), SyncError> {
        self.set_session_paused(id, true).await
    }

    pub async fn resume_session(&self, id: &SessionId) -> Result<(), SyncError> {
        self.set_session_paused(id, false).await
    }

    /// Returns true if a trigger for `id` must not start a sync
    pub fn is_paused(&self, id: &SessionId) -> bool {
        self.is_globally_paused() || self.registry.is_session_paused(id)
    }

    async fn set_session_paused(&self, id: &SessionId, paused: bool) -> Result<(), SyncError> {
        let session = self.registry.update(id, |s| s.paused = paused).await?;
        info!(session_id = %id, name = %session.name, paused, "Session pause state changed");
        Ok(())
    }
}
