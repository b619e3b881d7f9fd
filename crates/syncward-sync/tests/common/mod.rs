//! Fake ports shared by the integration suites
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use syncward_core::{
    domain::{RemoteConnection, Session, SessionId},
    ports::{
        CommandOutput, CommandSpec, IClock, ICommandRunner, ILogSink, INetworkIdentity,
        ISyncNotifier, LogEntry, SyncEvent,
    },
};
use syncward_store::MemorySessionStore;
use syncward_sync::{
    engine::{EngineSettings, ISyncRequester, TriggerEngine},
    pause::PauseController,
    registry::SessionRegistry,
};
use tokio::time::Instant;

// ============================================================================
// Clock
// ============================================================================

/// Wall clock that advances with tokio's (possibly paused) time
pub struct SimulatedClock {
    base: NaiveDateTime,
    started: Instant,
}

impl SimulatedClock {
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl IClock for SimulatedClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or_default();
        self.base + elapsed
    }
}

/// 2024-01-01 was a Monday
pub fn monday(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

// ============================================================================
// Network identity
// ============================================================================

#[derive(Default)]
pub struct FakeNetwork(Mutex<Option<String>>);

impl FakeNetwork {
    pub fn on(ssid: Option<&str>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(ssid.map(str::to_string))))
    }

    pub fn join(&self, ssid: Option<&str>) {
        *self.0.lock().unwrap() = ssid.map(str::to_string);
    }
}

#[async_trait::async_trait]
impl INetworkIdentity for FakeNetwork {
    async fn current(&self) -> Option<String> {
        self.0.lock().unwrap().clone()
    }
}

// ============================================================================
// Requester
// ============================================================================

/// Records every sync request with the simulated wall time it arrived at
pub struct RecordingRequester {
    clock: Arc<dyn IClock>,
    requests: Mutex<Vec<(SessionId, NaiveDateTime)>>,
}

impl RecordingRequester {
    pub fn new(clock: Arc<dyn IClock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<(SessionId, NaiveDateTime)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_for(&self, id: &SessionId) -> usize {
        self.requests().iter().filter(|(r, _)| r == id).count()
    }

    pub fn total(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ISyncRequester for RecordingRequester {
    async fn request_sync(&self, id: &SessionId) {
        let now = self.clock.now();
        self.requests.lock().unwrap().push((id.clone(), now));
    }
}

// ============================================================================
// Runner, notifier, log
// ============================================================================

/// Returns a fixed output and records every command
pub struct RecordingRunner {
    output: CommandOutput,
    seen: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn replying(output: CommandOutput) -> Arc<Self> {
        Arc::new(Self {
            output,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<CommandSpec> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ICommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> anyhow::Result<CommandOutput> {
        self.seen.lock().unwrap().push(command.clone());
        Ok(self.output.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier(Mutex<Vec<SyncEvent>>);

impl RecordingNotifier {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl ISyncNotifier for RecordingNotifier {
    fn notify(&self, event: &SyncEvent) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLog(Mutex<Vec<LogEntry>>);

impl RecordingLog {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.0.lock().unwrap().clone()
    }
}

impl ILogSink for RecordingLog {
    fn append(&self, entry: LogEntry) {
        self.0.lock().unwrap().push(entry);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn remote() -> RemoteConnection {
    RemoteConnection {
        host: "nas.local".into(),
        username: "backup".into(),
        password: Some("s3cret".into()),
        port: None,
        module_name: "home".into(),
        remote_path: "/laptop/".into(),
    }
}

/// An engine wired to fakes, with `sessions` loaded into the registry
pub struct EngineHarness {
    pub engine: TriggerEngine,
    pub requests: Arc<RecordingRequester>,
    pub pause: Arc<PauseController>,
    pub network: Arc<FakeNetwork>,
    pub store: Arc<MemorySessionStore>,
    pub sessions: Vec<Session>,
}

pub async fn engine_harness(
    sessions: Vec<Session>,
    start: NaiveDateTime,
    network: Option<&str>,
) -> EngineHarness {
    let store = Arc::new(MemorySessionStore::new(sessions));
    let registry = Arc::new(SessionRegistry::new(store.clone()));
    let sessions = registry.load().await;
    let pause = Arc::new(PauseController::new(registry));
    let clock: Arc<dyn IClock> = Arc::new(SimulatedClock::starting_at(start));
    let requests = RecordingRequester::new(clock.clone());
    let network = FakeNetwork::on(network);

    let engine = TriggerEngine::new(
        requests.clone(),
        pause.clone(),
        clock,
        network.clone(),
        EngineSettings {
            schedule_check: Duration::from_secs(30),
            wifi_poll: Duration::from_secs(10),
        },
    );

    EngineHarness {
        engine,
        requests,
        pause,
        network,
        store,
        sessions,
    }
}

/// Lets spawned dispatch tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
