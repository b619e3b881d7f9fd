//! Control surface
//!
//! [`SyncController`] wires the registry, pause controller, executor,
//! trigger engine and remote browser together and is the only type the
//! binaries talk to. It is transport-agnostic: callers get plain async
//! methods plus a broadcast stream of [`ControlEvent`]s.
//!
//! Every sync notification and sync-log entry produced through the
//! controller is forwarded to subscribers and then to the injected
//! notifier / log sink.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::Serialize;
use syncward_core::{
    config::Config,
    domain::{RemoteConnection, Session, SessionId},
    ports::{
        IClock, ICommandRunner, ILogSink, INetworkIdentity, ISessionStore, ISyncNotifier,
        LogEntry, SyncEvent,
    },
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    engine::{EngineSettings, ExecutorRequester, TriggerEngine},
    executor::{SyncExecutor, SyncOutcome},
    pause::PauseController,
    registry::SessionRegistry,
    remote::{RemoteBrowser, RemoteEntry, RemoteModule},
    SyncError,
};

/// Capacity of the control event channel; slow subscribers see `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// ControlEvent
// ============================================================================

/// Event delivered to control subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlEvent {
    /// A sync-log entry was written
    Log(LogEntry),
    /// A sync lifecycle event occurred
    Sync(SyncEvent),
}

// ============================================================================
// Broadcast adapters
// ============================================================================

/// [`ISyncNotifier`] publishing to control subscribers
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ControlEvent>,
    inner: Option<Arc<dyn ISyncNotifier>>,
}

impl BroadcastNotifier {
    pub fn new(tx: broadcast::Sender<ControlEvent>, inner: Option<Arc<dyn ISyncNotifier>>) -> Self {
        Self { tx, inner }
    }
}

impl ISyncNotifier for BroadcastNotifier {
    fn notify(&self, event: &SyncEvent) -> anyhow::Result<()> {
        // No subscribers is not an error
        let _ = self.tx.send(ControlEvent::Sync(event.clone()));
        match &self.inner {
            Some(inner) => inner.notify(event),
            None => Ok(()),
        }
    }
}

/// [`ILogSink`] publishing to control subscribers
pub struct BroadcastLogSink {
    tx: broadcast::Sender<ControlEvent>,
    inner: Option<Arc<dyn ILogSink>>,
}

impl BroadcastLogSink {
    pub fn new(tx: broadcast::Sender<ControlEvent>, inner: Option<Arc<dyn ILogSink>>) -> Self {
        Self { tx, inner }
    }
}

impl ILogSink for BroadcastLogSink {
    fn append(&self, entry: LogEntry) {
        let _ = self.tx.send(ControlEvent::Log(entry.clone()));
        if let Some(inner) = &self.inner {
            inner.append(entry);
        }
    }
}

// ============================================================================
// SyncController
// ============================================================================

/// Adapters the controller is built from
pub struct ControllerPorts {
    pub store: Arc<dyn ISessionStore>,
    pub runner: Arc<dyn ICommandRunner>,
    pub network: Arc<dyn INetworkIdentity>,
    pub clock: Arc<dyn IClock>,
    /// Receives sync notifications after subscribers
    pub notifier: Option<Arc<dyn ISyncNotifier>>,
    /// Durable sync log; receives entries after subscribers
    pub log_sink: Option<Arc<dyn ILogSink>>,
}

/// In-process control surface of the scheduler
pub struct SyncController {
    registry: Arc<SessionRegistry>,
    pause: Arc<PauseController>,
    executor: Arc<SyncExecutor>,
    engine: TriggerEngine,
    remote: RemoteBrowser,
    notifier: Arc<dyn ISyncNotifier>,
    log_sink: Arc<dyn ILogSink>,
    events: broadcast::Sender<ControlEvent>,
    running: AtomicBool,
}

impl SyncController {
    pub fn new(ports: ControllerPorts, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let notifier: Arc<dyn ISyncNotifier> =
            Arc::new(BroadcastNotifier::new(events.clone(), ports.notifier));
        let log_sink: Arc<dyn ILogSink> =
            Arc::new(BroadcastLogSink::new(events.clone(), ports.log_sink));

        let registry = Arc::new(SessionRegistry::new(ports.store));
        let pause = Arc::new(PauseController::new(registry.clone()));
        let executor = Arc::new(SyncExecutor::new(
            registry.clone(),
            ports.runner.clone(),
            notifier.clone(),
            config.executor.clone(),
        ));
        let requester = Arc::new(ExecutorRequester::new(executor.clone(), log_sink.clone()));
        let engine = TriggerEngine::new(
            requester,
            pause.clone(),
            ports.clock,
            ports.network,
            EngineSettings::from_config(&config.scheduler),
        );

        Self {
            registry,
            pause,
            executor,
            engine,
            remote: RemoteBrowser::new(ports.runner, config.executor.clone()),
            notifier,
            log_sink,
            events,
            running: AtomicBool::new(false),
        }
    }

    /// Loads the stored sessions and arms their triggers
    ///
    /// Returns the number of sessions loaded.
    pub async fn start(&self) -> usize {
        self.running.store(true, Ordering::Release);
        let count = self.load_sessions().await.len();
        info!(sessions = count, "Scheduler started");
        count
    }

    /// Reloads the collection and the global pause flag; re-arms when started
    pub async fn load_sessions(&self) -> Vec<Session> {
        let sessions = self.registry.load().await;
        self.pause.set_global(self.registry.load_global_pause().await);
        if self.is_running() {
            self.engine.rearm(&sessions);
        }
        self.emit(SyncEvent::SessionsUpdated {
            count: sessions.len(),
        });
        sessions
    }

    /// Swaps in a collection read elsewhere
    ///
    /// Re-arms and notifies only if a session definition changed; returns
    /// whether it did. Sync outcomes newer than `sessions` are kept.
    pub async fn replace_sessions(&self, sessions: Vec<Session>) -> bool {
        let changed = self.registry.replace_if_changed(sessions).await;
        self.announce_replacement(changed)
    }

    /// Re-reads the store after an external edit
    ///
    /// Applies the stored global pause flag, then behaves like
    /// [`replace_sessions`](Self::replace_sessions).
    pub async fn reload_sessions(&self) -> bool {
        self.pause.set_global(self.registry.load_global_pause().await);
        let changed = self.registry.reload_if_changed().await;
        self.announce_replacement(changed)
    }

    fn announce_replacement(&self, changed: bool) -> bool {
        if !changed {
            return false;
        }
        self.rearm_if_running();
        self.emit(SyncEvent::SessionsUpdated {
            count: self.registry.snapshot().len(),
        });
        true
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.registry.snapshot()
    }

    /// Looks a session up by id or exact name
    pub fn find_session(&self, id_or_name: &str) -> Option<Session> {
        self.registry.find(id_or_name)
    }

    /// Validates, stores and arms a new or edited session
    ///
    /// The destination is re-derived from the remote connection.
    pub async fn save_session(&self, mut session: Session) -> Result<Session, SyncError> {
        session.validate()?;
        session.refresh_destination();
        self.registry.upsert(session.clone()).await?;
        info!(session_id = %session.id, name = %session.name, "Session saved");

        self.rearm_if_running();
        self.emit(SyncEvent::SessionsUpdated {
            count: self.registry.snapshot().len(),
        });
        Ok(session)
    }

    pub async fn delete_session(&self, id: &SessionId) -> Result<Session, SyncError> {
        let removed = self.registry.remove(id).await?;
        self.executor.forget_session(id);
        info!(session_id = %id, name = %removed.name, "Session deleted");

        self.rearm_if_running();
        self.emit(SyncEvent::SessionsUpdated {
            count: self.registry.snapshot().len(),
        });
        Ok(removed)
    }

    /// Runs a sync right away, ignoring both pause gates
    pub async fn sync_now(&self, id: &SessionId) -> Result<SyncOutcome, SyncError> {
        self.executor.run_session(id, &*self.log_sink).await
    }

    /// Pauses every trigger-initiated sync and persists the global flag
    ///
    /// Per-session pause flags are left as they are.
    pub async fn pause_all(&self) -> Result<(), SyncError> {
        self.registry.save_global_pause(true).await?;
        self.pause.pause_all();
        Ok(())
    }

    pub async fn resume_all(&self) -> Result<(), SyncError> {
        self.registry.save_global_pause(false).await?;
        self.pause.resume_all();
        Ok(())
    }

    pub fn is_globally_paused(&self) -> bool {
        self.pause.is_globally_paused()
    }

    pub async fn pause_session(&self, id: &SessionId) -> Result<(), SyncError> {
        self.pause.pause_session(id).await
    }

    pub async fn resume_session(&self, id: &SessionId) -> Result<(), SyncError> {
        self.pause.resume_session(id).await
    }

    /// Subscribes to sync and log events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub async fn list_remote_directory(
        &self,
        connection: &RemoteConnection,
        path: &str,
    ) -> Result<Vec<RemoteEntry>, SyncError> {
        self.remote.list_directory(connection, path).await
    }

    pub async fn list_available_modules(
        &self,
        connection: &RemoteConnection,
    ) -> Result<Vec<RemoteModule>, SyncError> {
        self.remote.list_modules(connection).await
    }

    /// Disarms every trigger; running syncs finish on their own
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.engine.disarm();
        info!("Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    pub fn executor(&self) -> &SyncExecutor {
        &self.executor
    }

    fn rearm_if_running(&self) {
        if self.is_running() {
            self.engine.rearm(&self.registry.snapshot());
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.notifier.notify(&event) {
            warn!(error = %e, "Sync notification failed");
        }
    }
}
