//! Control surface: session management, manual syncs and event stream

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{remote, settle, FakeNetwork, RecordingNotifier, RecordingRunner};
use syncward_core::{
    config::Config,
    domain::{IntervalTrigger, Session, SyncStatus, Trigger},
    ports::{CommandOutput, ISessionStore, SyncEvent, SystemClock},
};
use syncward_store::MemorySessionStore;
use syncward_sync::{
    control::{ControlEvent, ControllerPorts, SyncController},
    SyncError,
};

struct Harness {
    controller: SyncController,
    store: Arc<MemorySessionStore>,
    runner: Arc<RecordingRunner>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(sessions: Vec<Session>, output: CommandOutput) -> Harness {
    let store = Arc::new(MemorySessionStore::new(sessions));
    let runner = RecordingRunner::replying(output);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = SyncController::new(
        ControllerPorts {
            store: store.clone(),
            runner: runner.clone(),
            network: FakeNetwork::on(None),
            clock: Arc::new(SystemClock),
            notifier: Some(notifier.clone()),
            log_sink: None,
        },
        &Config::default(),
    );
    Harness {
        controller,
        store,
        runner,
        notifier,
    }
}

fn hourly(name: &str, source: &std::path::Path) -> Session {
    Session::new(name, source)
        .with_remote(remote())
        .with_trigger(Trigger::Interval(IntervalTrigger {
            interval_minutes: 60,
            start_time: None,
            end_time: None,
        }))
}

#[tokio::test]
async fn test_start_loads_and_arms() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));

    assert_eq!(h.controller.start().await, 1);

    assert!(h.controller.is_running());
    assert_eq!(h.controller.engine().active_handle_count(), 1);
    assert!(h
        .notifier
        .events()
        .contains(&SyncEvent::SessionsUpdated { count: 1 }));

    h.controller.shutdown();
    assert!(!h.controller.engine().is_armed());
}

#[tokio::test]
async fn test_save_and_delete_rearm_when_running() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(Vec::new(), CommandOutput::success(""));
    h.controller.start().await;
    assert_eq!(h.controller.engine().active_handle_count(), 0);

    let mut session = hourly("docs", dir.path());
    session.destination_path = "stale".into();
    let saved = h.controller.save_session(session).await.unwrap();

    assert_eq!(saved.destination_path, "rsync://backup@nas.local:873/home/laptop");
    assert_eq!(h.store.snapshot().len(), 1);
    assert_eq!(h.controller.engine().active_handle_count(), 1);

    h.controller.delete_session(&saved.id).await.unwrap();
    assert!(h.store.snapshot().is_empty());
    assert_eq!(h.controller.engine().active_handle_count(), 0);

    let err = h.controller.delete_session(&saved.id).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn test_save_rejects_invalid_session() {
    let h = harness(Vec::new(), CommandOutput::success(""));
    let session = Session::new("   ", "/home/u/docs");

    let err = h.controller.save_session(session).await.unwrap_err();

    assert!(matches!(err, SyncError::Config(_)));
    assert!(h.store.snapshot().is_empty());
}

#[tokio::test]
async fn test_sync_now_ignores_pause() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));
    h.controller.load_sessions().await;
    let id = h.controller.find_session("docs").unwrap().id;

    h.controller.pause_all().await.unwrap();
    h.controller.pause_session(&id).await.unwrap();
    let outcome = h.controller.sync_now(&id).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Success);
    assert_eq!(h.runner.seen().len(), 1);
    assert!(h.controller.is_globally_paused());
    assert!(h.store.snapshot()[0].paused);
}

#[tokio::test]
async fn test_subscribers_receive_sync_and_log_events() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));
    h.controller.load_sessions().await;
    let id = h.controller.sessions()[0].id.clone();
    let mut rx = h.controller.subscribe();

    h.controller.sync_now(&id).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(ControlEvent::Sync(SyncEvent::Started { .. }))));
    assert!(events.iter().any(|e| matches!(e, ControlEvent::Log(l) if l.message == "Sync completed")));
    assert!(matches!(
        events.last(),
        Some(ControlEvent::Sync(SyncEvent::Finished { status: SyncStatus::Success, .. }))
    ));
}

#[tokio::test]
async fn test_replace_sessions_ignores_bookkeeping_changes() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));
    h.controller.start().await;

    let mut edited = h.controller.sessions();
    edited[0].last_sync_status = SyncStatus::Success;
    edited[0].paused = true;
    assert!(!h.controller.replace_sessions(edited.clone()).await);

    edited[0].enabled = false;
    assert!(h.controller.replace_sessions(edited).await);
    assert_eq!(h.controller.engine().active_handle_count(), 0);

    h.controller.shutdown();
}

#[tokio::test]
async fn test_remote_listing_goes_through_runner() {
    let h = harness(
        Vec::new(),
        CommandOutput::success("backup         \tNightly backups\n"),
    );

    let modules = h.controller.list_available_modules(&remote()).await.unwrap();

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].name, "backup");
    assert_eq!(h.runner.seen()[0].args, vec!["rsync://nas.local:873/"]);
}

#[tokio::test]
async fn test_global_pause_is_persisted_apart_from_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        vec![hourly("docs", dir.path()), hourly("photos", dir.path())],
        CommandOutput::success(""),
    );
    h.controller.load_sessions().await;
    let docs = h.controller.find_session("docs").unwrap().id;

    h.controller.pause_session(&docs).await.unwrap();
    h.controller.pause_all().await.unwrap();
    assert!(h.store.load_paused().await);

    h.controller.resume_all().await.unwrap();
    assert!(!h.controller.is_globally_paused());
    assert!(!h.store.load_paused().await);

    let stored = h.store.snapshot();
    assert!(stored.iter().find(|s| s.id == docs).unwrap().paused);
    assert!(!stored.iter().find(|s| s.name == "photos").unwrap().paused);
}

#[tokio::test]
async fn test_reload_applies_stored_global_pause() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));
    h.controller.start().await;
    assert!(!h.controller.is_globally_paused());

    // Another process paused everything
    h.store.save_paused(true).await.unwrap();
    assert!(!h.controller.reload_sessions().await);
    assert!(h.controller.is_globally_paused());

    h.store.save_paused(false).await.unwrap();
    h.controller.load_sessions().await;
    assert!(!h.controller.is_globally_paused());

    h.controller.shutdown();
}

#[tokio::test]
async fn test_reload_keeps_outcome_newer_than_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));
    h.controller.load_sessions().await;
    let stale = h.store.snapshot();
    let id = stale[0].id.clone();

    h.controller.sync_now(&id).await.unwrap();
    assert!(!h.controller.replace_sessions(stale).await);

    let docs = h.controller.find_session("docs").unwrap();
    assert_eq!(docs.last_sync_status, SyncStatus::Success);
    assert!(docs.last_sync.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_interval_failures_are_recorded_and_scheduler_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        vec![hourly("docs", dir.path())],
        CommandOutput::failure(
            10,
            "rsync: failed to connect to nas.local (10.0.0.2): Connection refused (111)",
        ),
    );
    h.controller.start().await;

    tokio::time::sleep(Duration::from_secs(61 * 60)).await;
    settle().await;
    assert_eq!(h.runner.seen().len(), 1);

    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    settle().await;
    assert_eq!(h.runner.seen().len(), 2);

    let failures = h
        .notifier
        .events()
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::Failed { .. }))
        .count();
    assert_eq!(failures, 2);

    assert!(h.controller.is_running());
    assert!(h.controller.engine().is_armed());
    let stored = &h.store.snapshot()[0];
    assert_eq!(stored.last_sync_status, SyncStatus::Error);
    assert!(stored
        .last_sync_error
        .as_deref()
        .unwrap()
        .starts_with("Connection refused"));

    h.controller.shutdown();
}

#[tokio::test]
async fn test_delete_drops_the_session_lock() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(vec![hourly("docs", dir.path())], CommandOutput::success(""));
    h.controller.load_sessions().await;
    let id = h.controller.sessions()[0].id.clone();

    h.controller.sync_now(&id).await.unwrap();
    assert_eq!(h.controller.executor().tracked_sessions(), 1);

    h.controller.delete_session(&id).await.unwrap();
    assert_eq!(h.controller.executor().tracked_sessions(), 0);
}
