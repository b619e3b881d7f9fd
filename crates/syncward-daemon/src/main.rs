//! Syncward Daemon - Background rsync scheduler
//!
//! This binary runs as a user service and:
//! - Loads the session collection and arms every trigger
//! - Runs rsync whenever a trigger fires
//! - Reloads the session file when it is edited externally (e.g. by the CLI)
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! All scheduling lives in [`SyncController`]; the daemon only wires real
//! adapters into it, keeps the session file watch alive and waits on a
//! `CancellationToken` that is triggered by the signal handler.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use notify::RecommendedWatcher;
use syncward_audit::FileLogSink;
use syncward_core::{
    config::{Config, LoggingConfig},
    ports::{ILogSink, ISyncNotifier, NotificationPriority, SyncEvent, SystemClock},
};
use syncward_store::JsonSessionStore;
use syncward_sync::{
    control::{ControllerPorts, SyncController},
    network::SystemNetworkIdentity,
    runner::ProcessRunner,
    watcher::{debounce_changes, watch_path, IgnoreFilter, CHANGE_CHANNEL_CAPACITY},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Quiet period before an edited session file is reloaded
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

// ============================================================================
// TracingNotifier
// ============================================================================

/// [`ISyncNotifier`] that reports sync events through the daemon log
struct TracingNotifier;

impl ISyncNotifier for TracingNotifier {
    fn notify(&self, event: &SyncEvent) -> Result<()> {
        let notification = event.to_notification();
        match notification.priority {
            NotificationPriority::High => {
                warn!(title = %notification.title, body = %notification.body, "Sync notification")
            }
            NotificationPriority::Normal => {
                info!(title = %notification.title, body = %notification.body, "Sync notification")
            }
            NotificationPriority::Low => {
                debug!(title = %notification.title, body = %notification.body, "Sync notification")
            }
        }
        Ok(())
    }
}

/// Opens the rotated sync log; the daemon keeps running without one
fn open_audit_sink(logging: &LoggingConfig) -> Option<Arc<dyn ILogSink>> {
    let max_bytes = logging.max_size_mb.saturating_mul(1024 * 1024);
    match FileLogSink::open(&logging.audit_dir, max_bytes, logging.max_files) {
        Ok(sink) => {
            info!(path = %sink.active_path().display(), "Sync log opened");
            Some(Arc::new(sink))
        }
        Err(e) => {
            error!(error = %e, "Failed to open sync log, continuing without it");
            None
        }
    }
}

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that owns the controller and the reload watch
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Store backing the controller; re-read on external edits
    store: Arc<JsonSessionStore>,
    controller: Arc<SyncController>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates the service from `config`, wiring the real adapters
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        let store = Arc::new(JsonSessionStore::new(&config.sessions.file));
        let runner = Arc::new(ProcessRunner::new());

        let controller = SyncController::new(
            ControllerPorts {
                store: store.clone(),
                runner: runner.clone(),
                network: Arc::new(SystemNetworkIdentity::new(runner)),
                clock: Arc::new(SystemClock),
                notifier: Some(Arc::new(TracingNotifier)),
                log_sink: open_audit_sink(&config.logging),
            },
            &config,
        );

        Self {
            config,
            store,
            controller: Arc::new(controller),
            shutdown,
        }
    }

    /// Runs until the shutdown token fires
    ///
    /// 1. Loads the sessions and arms their triggers
    /// 2. Watches the session file for external edits
    /// 3. Waits for shutdown, then disarms everything
    async fn run(&self) -> Result<()> {
        let count = self.controller.start().await;
        info!(
            sessions = count,
            file = %self.config.sessions.file.display(),
            "Scheduler armed"
        );

        // Reloading is optional; without it the daemon still syncs
        let _reload = match self.watch_session_file().await {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Session file changes will not be picked up");
                None
            }
        };

        self.shutdown.cancelled().await;
        info!("Shutdown signal received");

        self.controller.shutdown();
        Ok(())
    }

    // ========================================================================
    // Session file reload
    // ========================================================================

    /// Watches the directory of the session file and reloads on changes
    ///
    /// The directory is watched rather than the file because saves replace
    /// the file by renaming a temporary file over it. Reloads that do not
    /// change any session definition leave the triggers alone, so the
    /// daemon's own saves do not cause re-arming. The global pause flag is
    /// kept in the same directory and is picked up by the same reload.
    async fn watch_session_file(&self) -> Result<RecommendedWatcher> {
        let file = self.store.path();
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let (change_tx, change_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let watcher = watch_path(&dir, false, change_tx)?;

        let (reload_tx, reload_rx) = mpsc::channel::<()>(1);
        tokio::spawn(debounce_changes(
            dir,
            change_rx,
            IgnoreFilter::default(),
            RELOAD_DEBOUNCE,
            self.shutdown.clone(),
            move || {
                // A reload is already queued when this fails
                let _ = reload_tx.try_send(());
            },
        ));

        tokio::spawn(reload_loop(
            self.controller.clone(),
            reload_rx,
            self.shutdown.clone(),
        ));

        info!(path = %file.display(), "Watching session file");
        Ok(watcher)
    }
}

async fn reload_loop(
    controller: Arc<SyncController>,
    mut requests: mpsc::Receiver<()>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            request = requests.recv() => {
                if request.is_none() {
                    break;
                }
                let changed = controller.reload_sessions().await;
                let count = controller.sessions().len();
                if changed {
                    info!(sessions = count, "Session file changed, triggers re-armed");
                } else {
                    debug!(
                        sessions = count,
                        globally_paused = controller.is_globally_paused(),
                        "Session file reloaded without definition changes"
                    );
                }
            }
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still works.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "Syncward daemon starting (syncwardd)");

    for problem in config.validate() {
        warn!(field = %problem.field, "Invalid configuration: {}", problem.message);
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token);
    let result = service.run().await;

    match &result {
        Ok(()) => info!("Syncward daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Syncward daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
