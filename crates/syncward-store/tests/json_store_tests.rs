//! Integration tests: JsonSessionStore round-trips full session collections

use chrono::Utc;
use syncward_core::{
    domain::{
        FileChangeTrigger, IntervalTrigger, RemoteConnection, ScheduleDay, ScheduleTrigger,
        Session, SyncStatus, Trigger, WifiTrigger,
    },
    ports::ISessionStore,
};
use syncward_store::JsonSessionStore;

fn full_session() -> Session {
    let mut session = Session::new("photos", "/home/user/Pictures")
        .with_remote(RemoteConnection {
            host: "nas.local".into(),
            username: "backup".into(),
            password: Some("s3cret".into()),
            port: Some(8730),
            module_name: "media".into(),
            remote_path: "photos".into(),
        })
        .with_trigger(Trigger::Schedule(ScheduleTrigger {
            time: "02:30".parse().unwrap(),
            days: vec![ScheduleDay::Saturday, ScheduleDay::Sunday],
        }))
        .with_trigger(Trigger::Interval(IntervalTrigger {
            interval_minutes: 60,
            start_time: Some("08:00".parse().unwrap()),
            end_time: Some("20:00".parse().unwrap()),
        }))
        .with_trigger(Trigger::FileChange(FileChangeTrigger {
            watch_paths: vec!["/home/user/Pictures".into()],
            recursive: true,
            debounce_ms: 2000,
            ignore_patterns: vec!["*.part".into()],
        }))
        .with_trigger(Trigger::Wifi(WifiTrigger {
            ssid: "home".into(),
            on_connect: true,
        }));
    session.exclude_patterns = vec!["*.tmp".into(), ".cache".into()];
    session.sync_options.delete_on_destination = true;
    session.record_failure(Utc::now(), "Connection refused");
    session
}

#[tokio::test]
async fn test_round_trip_preserves_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonSessionStore::new(dir.path().join("sessions.json"));

    let original = vec![full_session(), Session::new("empty", "/tmp/empty")];
    store.save(&original).await.unwrap();

    let loaded = store.load().await;
    assert_eq!(loaded, original);
    assert_eq!(loaded[0].last_sync_status, SyncStatus::Error);
    assert_eq!(loaded[0].destination_path, "rsync://backup@nas.local:8730/media/photos");
}

#[tokio::test]
async fn test_save_overwrites_previous_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonSessionStore::new(dir.path().join("sessions.json"));

    store
        .save(&[Session::new("a", "/a"), Session::new("b", "/b")])
        .await
        .unwrap();
    store.save(&[Session::new("c", "/c")]).await.unwrap();

    let loaded = store.load().await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "c");
}

#[tokio::test]
async fn test_loads_collection_written_by_other_tools() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    std::fs::write(
        &path,
        r#"[{
            "id": "1712345678901",
            "name": "notes",
            "sourcePath": "/tmp/src",
            "triggers": [{"type": "startup", "delayMs": 5000}],
            "remoteConnection": {"host": "h", "username": "u", "moduleName": "m", "remotePath": "p"},
            "lastSyncStatus": "success"
        }]"#,
    )
    .unwrap();

    let loaded = JsonSessionStore::new(&path).load().await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id.as_str(), "1712345678901");
    assert_eq!(loaded[0].last_sync_status, SyncStatus::Success);
    assert!(loaded[0].sync_options.update_only);
}
