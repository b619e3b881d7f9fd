//! Sync executor
//!
//! Runs one sync of one session: validates the session, builds and runs the
//! rsync command, records the outcome on the session and persists the
//! collection. Every invocation gets an id that ties together its entries in
//! the sync log.
//!
//! ## Notifications
//!
//! `Started` is emitted before any work. A failed sync emits exactly one
//! `Failed` followed by `Finished`; a successful one emits only `Finished`.
//!
//! ## Serialization
//!
//! At most one sync per session runs at a time. Requests for a session that
//! is already syncing wait for the running one to finish. Different sessions
//! sync concurrently.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use syncward_core::{
    config::ExecutorConfig,
    domain::{Session, SessionId, SyncStatus},
    ports::{ICommandRunner, ILogSink, ISyncNotifier, LogEntry, LogLevel, SyncEvent},
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    classify::{failure_message, FailureKind, RSYNC_EXIT_VANISHED},
    command::build_sync_command,
    registry::SessionRegistry,
    stats::TransferStats,
    SyncError,
};

/// Message recorded when rsync exits with code 24
pub const VANISHED_MESSAGE: &str =
    "Some files vanished before they could be transferred";

/// Result of a sync that completed (possibly with a warning)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub session_id: SessionId,
    pub invocation_id: Uuid,
    pub status: SyncStatus,
    pub stats: TransferStats,
    /// Warning text for [`SyncStatus::Warning`]
    pub warning: Option<String>,
    /// The command line that was run, without secrets
    pub command_line: String,
}

/// What a finished rsync run produced, before it is recorded
struct Completed {
    status: SyncStatus,
    stats: TransferStats,
    warning: Option<String>,
    command_line: String,
}

/// Writes the sync-log entries of a single invocation
struct InvocationLog<'a> {
    sink: &'a dyn ILogSink,
    session_id: &'a SessionId,
    name: &'a str,
    invocation_id: Uuid,
}

impl InvocationLog<'_> {
    fn append(&self, level: LogLevel, message: impl Into<String>, details: Value) {
        self.sink.append(
            LogEntry::new(level, message)
                .with_session(self.session_id, self.name)
                .with_invocation(self.invocation_id)
                .with_details(details),
        );
    }
}

/// Performs syncs and records their outcome
pub struct SyncExecutor {
    registry: Arc<SessionRegistry>,
    runner: Arc<dyn ICommandRunner>,
    notifier: Arc<dyn ISyncNotifier>,
    config: ExecutorConfig,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SyncExecutor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        runner: Arc<dyn ICommandRunner>,
        notifier: Arc<dyn ISyncNotifier>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            runner,
            notifier,
            config,
            locks: DashMap::new(),
        }
    }

    /// Returns true while a sync of `id` holds the session lock
    pub fn is_running(&self, id: &SessionId) -> bool {
        self.locks
            .get(id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Drops the lock of a session that no longer exists
    ///
    /// A lock still shared with a running or queued sync is kept.
    pub fn forget_session(&self, id: &SessionId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of sessions with a lock entry
    pub fn tracked_sessions(&self) -> usize {
        self.locks.len()
    }

    /// Syncs the session with `id`
    ///
    /// # Errors
    /// - [`SyncError::NotFound`] if the session does not exist (nothing is
    ///   recorded or notified)
    /// - [`SyncError::Path`] if the source is missing or unreadable
    /// - [`SyncError::Config`] if the session has no remote connection
    /// - [`SyncError::Process`] / [`SyncError::Io`] if rsync failed or could
    ///   not be started
    ///
    /// All errors except `NotFound` are recorded on the session first.
    #[tracing::instrument(skip(self, id, log), fields(session_id = %id))]
    pub async fn run_session(
        &self,
        id: &SessionId,
        log: &dyn ILogSink,
    ) -> Result<SyncOutcome, SyncError> {
        let lock = self.locks.entry(id.clone()).or_default().clone();
        let _guard = lock.lock().await;

        let session = self
            .registry
            .get(id)
            .ok_or_else(|| SyncError::NotFound(id.clone()))?;

        let log = InvocationLog {
            sink: log,
            session_id: &session.id,
            name: &session.name,
            invocation_id: Uuid::new_v4(),
        };

        self.notify(SyncEvent::Started {
            session_id: session.id.clone(),
            name: session.name.clone(),
        });
        info!(name = %session.name, invocation_id = %log.invocation_id, "Sync started");
        log.append(LogLevel::Info, "Sync started", Value::Null);

        match self.execute(&session, &log).await {
            Ok(done) => {
                let now = Utc::now();
                match &done.warning {
                    Some(warning) => {
                        self.record(id, |s| s.record_warning(now, warning.clone())).await;
                        warn!(name = %session.name, warning = %warning, "Sync completed with warnings");
                        log.append(LogLevel::Warn, warning.clone(), json!({ "stats": done.stats }));
                    }
                    None => {
                        self.record(id, |s| s.record_success(now)).await;
                        info!(
                            name = %session.name,
                            files_transferred = ?done.stats.files_transferred,
                            total_transferred = ?done.stats.total_transferred,
                            "Sync completed"
                        );
                        log.append(LogLevel::Info, "Sync completed", json!({ "stats": done.stats }));
                    }
                }

                self.notify(SyncEvent::Finished {
                    session_id: session.id.clone(),
                    name: session.name.clone(),
                    status: done.status,
                });

                Ok(SyncOutcome {
                    session_id: session.id.clone(),
                    invocation_id: log.invocation_id,
                    status: done.status,
                    stats: done.stats,
                    warning: done.warning,
                    command_line: done.command_line,
                })
            }
            Err(err) => {
                let message = err.to_string();
                let now = Utc::now();
                self.record(id, |s| s.record_failure(now, message.clone())).await;

                error!(name = %session.name, error = %message, "Sync failed");
                log.append(
                    LogLevel::Error,
                    message.clone(),
                    json!({ "kind": err.failure_kind() }),
                );

                self.notify(SyncEvent::Failed {
                    session_id: session.id.clone(),
                    name: session.name.clone(),
                    message,
                });
                self.notify(SyncEvent::Finished {
                    session_id: session.id.clone(),
                    name: session.name.clone(),
                    status: SyncStatus::Error,
                });

                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        session: &Session,
        log: &InvocationLog<'_>,
    ) -> Result<Completed, SyncError> {
        check_source(&session.source_path).await?;
        let command = build_sync_command(session, &self.config)?;

        let command_line = command.display_line();
        debug!(command = %command_line, "Running rsync");
        log.append(LogLevel::Info, "Running rsync", json!({ "command": command_line }));

        let output = self.runner.run(&command).await.map_err(spawn_error)?;

        if !output.stdout.trim().is_empty() {
            log.append(LogLevel::Debug, "rsync output", json!({ "stdout": output.stdout }));
        }
        if !output.stderr.trim().is_empty() {
            log.append(LogLevel::Debug, "rsync errors", json!({ "stderr": output.stderr }));
        }

        let stats = TransferStats::parse(&output.stdout);
        match output.exit_code {
            Some(0) => Ok(Completed {
                status: SyncStatus::Success,
                stats,
                warning: None,
                command_line,
            }),
            Some(RSYNC_EXIT_VANISHED) => Ok(Completed {
                status: SyncStatus::Warning,
                stats,
                warning: Some(VANISHED_MESSAGE.to_string()),
                command_line,
            }),
            exit_code => {
                let kind = FailureKind::classify(&output.stderr);
                Err(SyncError::Process {
                    kind,
                    message: failure_message(kind, exit_code, &output.stderr),
                    exit_code,
                })
            }
        }
    }

    /// Applies an outcome to the session; failures here never fail the sync
    async fn record<F>(&self, id: &SessionId, f: F)
    where
        F: FnOnce(&mut Session),
    {
        match self.registry.update(id, f).await {
            Ok(_) => {}
            Err(SyncError::NotFound(_)) => {
                debug!(session_id = %id, "Session removed while syncing, outcome not recorded");
            }
            Err(e) => warn!(session_id = %id, error = %e, "Failed to persist sync outcome"),
        }
    }

    fn notify(&self, event: SyncEvent) {
        if let Err(e) = self.notifier.notify(&event) {
            warn!(error = %e, "Sync notification failed");
        }
    }
}

/// Verifies that the source exists and can be read
async fn check_source(path: &Path) -> Result<(), SyncError> {
    let path_error = |reason: String| SyncError::Path {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            path_error("Source path does not exist".to_string())
        } else {
            path_error(format!("Source path is not accessible ({e})"))
        }
    })?;

    let readable = if metadata.is_dir() {
        tokio::fs::read_dir(path).await.map(|_| ())
    } else {
        tokio::fs::File::open(path).await.map(|_| ())
    };
    readable.map_err(|e| path_error(format!("Source path is not readable ({e})")))
}

/// Maps a runner error (rsync could not be run at all)
fn spawn_error(err: anyhow::Error) -> SyncError {
    match err.downcast_ref::<std::io::Error>() {
        Some(io) => SyncError::Io(std::io::Error::new(io.kind(), format!("{err:#}"))),
        None => SyncError::Process {
            kind: FailureKind::Generic,
            message: format!("Failed to run rsync: {err:#}"),
            exit_code: None,
        },
    }
}
