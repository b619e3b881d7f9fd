//! Syncward Sync - Trigger-driven rsync scheduler
//!
//! Provides:
//! - A trigger engine arming schedule, interval, file-change, WiFi and
//!   startup watchers per session
//! - Global and per-session pause gates
//! - A per-session serialized rsync executor with failure classification
//! - Adapters for subprocesses, network identity and remote browsing
//! - An in-process control surface for callers (daemon, CLI)
//!
//! ## Modules
//!
//! - [`engine`] - Arms and disarms trigger watchers, dispatches fires
//! - [`executor`] - Runs one sync of one session
//! - [`command`] - Builds the rsync command line from a session
//! - [`classify`] - Maps rsync failures onto user-facing messages
//! - [`stats`] - Parses `--stats` output
//! - [`registry`] - Working copy of the session collection
//! - [`pause`] - Pause controller
//! - [`watcher`] - Filesystem watch and debounce plumbing
//! - [`runner`] - `tokio::process` command runner
//! - [`network`] - Platform network identity detection
//! - [`remote`] - Remote directory listing and module discovery
//! - [`control`] - Control surface and broadcast adapters

pub mod classify;
pub mod command;
pub mod control;
pub mod engine;
pub mod executor;
pub mod network;
pub mod pause;
pub mod registry;
pub mod remote;
pub mod runner;
pub mod stats;
pub mod watcher;

use std::path::PathBuf;

use syncward_core::domain::{DomainError, SessionId};
use thiserror::Error;

pub use classify::FailureKind;

/// Errors that can occur while scheduling or running a sync
#[derive(Debug, Error)]
pub enum SyncError {
    /// No session with the given id exists
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// The session cannot be synced as configured
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source path is missing or unreadable
    #[error("{reason}: {}", path.display())]
    Path { path: PathBuf, reason: String },

    /// rsync ran and reported a failure
    #[error("{message}")]
    Process {
        kind: FailureKind,
        message: String,
        exit_code: Option<i32>,
    },

    /// rsync could not be started
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session collection could not be persisted
    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    /// The failure classification, if the error came from rsync itself
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SyncError::Process { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        SyncError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_message_names_path() {
        let err = SyncError::Path {
            path: PathBuf::from("/tmp/missing"),
            reason: "Source path does not exist".into(),
        };
        assert_eq!(err.to_string(), "Source path does not exist: /tmp/missing");
    }

    #[test]
    fn test_failure_kind_only_for_process_errors() {
        let err = SyncError::Process {
            kind: FailureKind::ConnectionRefused,
            message: "refused".into(),
            exit_code: Some(10),
        };
        assert_eq!(err.failure_kind(), Some(FailureKind::ConnectionRefused));
        assert_eq!(SyncError::Config("x".into()).failure_kind(), None);
    }

    #[test]
    fn test_domain_error_becomes_config_error() {
        let err: SyncError = DomainError::ValidationFailed("name cannot be empty".into()).into();
        assert!(matches!(err, SyncError::Config(msg) if msg.contains("name cannot be empty")));
    }
}
