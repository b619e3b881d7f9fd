//! Trigger engine
//!
//! The [`TriggerEngine`] owns every timer, filesystem watcher and polling
//! loop that can start a sync. It is armed against a full session collection
//! and re-armed wholesale whenever that collection changes.
//!
//! ## Generations
//!
//! Each `arm` starts a new generation holding a [`CancellationToken`], the
//! task handles and the `notify` watchers it created. `disarm` cancels the
//! token, aborts the tasks, drops the watchers and bumps the generation
//! counter under the dispatch lock. A fire only dispatches while holding
//! that lock and only if its generation is still current, so nothing armed
//! before `disarm` returned can start a sync afterwards. Syncs already in
//! flight are not cancelled.
//!
//! ## State kept across re-arms
//!
//! - the startup latch and still-pending startup deadlines
//! - the last observed network identity, while a WiFi poll loop stays armed
//! - the last minute each schedule trigger fired
//!
//! ```text
//! schedule ─┐
//! interval ─┤                ┌─ paused? ── skip (info)
//! files ────┼─→ fire(gen) ───┤
//! wifi ─────┤                └─ spawn ISyncRequester::request_sync
//! startup ──┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use notify::RecommendedWatcher;
use syncward_core::{
    config::SchedulerConfig,
    domain::{
        ClockTime, FileChangeTrigger, IntervalTrigger, ScheduleDay, ScheduleTrigger, Session,
        SessionId, StartupTrigger, Trigger, WifiTrigger,
    },
    ports::{IClock, ILogSink, INetworkIdentity},
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    executor::SyncExecutor,
    pause::PauseController,
    watcher::{debounce_changes, watch_path, IgnoreFilter, CHANGE_CHANNEL_CAPACITY},
};

// ============================================================================
// Settings
// ============================================================================

/// Timing knobs of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// How often schedule triggers compare the clock; at most one minute
    pub schedule_check: Duration,
    /// How often the network identity is sampled
    pub wifi_poll: Duration,
}

impl EngineSettings {
    const MAX_SCHEDULE_CHECK: Duration = Duration::from_secs(60);

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            schedule_check: Duration::from_secs(config.schedule_check_secs),
            wifi_poll: Duration::from_secs(config.wifi_poll_secs),
        }
        .clamped()
    }

    fn clamped(self) -> Self {
        Self {
            schedule_check: self
                .schedule_check
                .clamp(Duration::from_secs(1), Self::MAX_SCHEDULE_CHECK),
            wifi_poll: self.wifi_poll.max(Duration::from_secs(1)),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

// ============================================================================
// ISyncRequester
// ============================================================================

/// Receives the sync requests of fired triggers
///
/// Implementations handle their own errors; a failed sync must never reach
/// the engine.
#[async_trait::async_trait]
pub trait ISyncRequester: Send + Sync {
    async fn request_sync(&self, id: &SessionId);
}

/// [`ISyncRequester`] running the executor and logging failures
pub struct ExecutorRequester {
    executor: Arc<SyncExecutor>,
    log_sink: Arc<dyn ILogSink>,
}

impl ExecutorRequester {
    pub fn new(executor: Arc<SyncExecutor>, log_sink: Arc<dyn ILogSink>) -> Self {
        Self { executor, log_sink }
    }
}

#[async_trait::async_trait]
impl ISyncRequester for ExecutorRequester {
    async fn request_sync(&self, id: &SessionId) {
        if let Err(e) = self.executor.run_session(id, &*self.log_sink).await {
            error!(session_id = %id, error = %e, "Triggered sync failed");
        }
    }
}

// ============================================================================
// Engine state
// ============================================================================

/// A trigger identified by its session and position in the trigger list
type TriggerKey = (SessionId, usize);

/// A startup trigger identified by its session and its position among that
/// session's startup triggers, so edits to other triggers keep it stable
type StartupKey = (SessionId, usize);

/// Handles owned by one arm generation
#[derive(Default)]
struct ArmedGeneration {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    watchers: Vec<RecommendedWatcher>,
}

impl ArmedGeneration {
    fn live_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count() + self.watchers.len()
    }
}

/// State shared between the engine and the tasks it spawns
struct EngineShared {
    requester: Arc<dyn ISyncRequester>,
    pause: Arc<PauseController>,
    clock: Arc<dyn IClock>,
    network: Arc<dyn INetworkIdentity>,
    settings: EngineSettings,
    /// Current generation; also the dispatch lock
    generation: Mutex<u64>,
    startup_latched: AtomicBool,
    pending_startups: Mutex<HashMap<StartupKey, Instant>>,
    /// `None` until the first sample
    last_network: Mutex<Option<Option<String>>>,
    schedule_fired: Mutex<HashMap<TriggerKey, (NaiveDate, u32, u32)>>,
}

impl EngineShared {
    fn fire(&self, generation: u64, id: &SessionId, kind: &'static str) {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            debug!(session_id = %id, trigger = kind, "Dropping fire from a disarmed generation");
            return;
        }
        self.dispatch(id, kind);
    }

    fn fire_startup(&self, generation: u64, key: &StartupKey) {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            return;
        }
        self.pending_startups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.dispatch(&key.0, "startup");
    }

    /// Must be called with the dispatch lock held
    fn dispatch(&self, id: &SessionId, kind: &'static str) {
        if self.pause.is_paused(id) {
            info!(session_id = %id, trigger = kind, "Session paused, skipping trigger");
            return;
        }
        info!(session_id = %id, trigger = kind, "Trigger fired");
        let requester = self.requester.clone();
        let id = id.clone();
        tokio::spawn(async move {
            requester.request_sync(&id).await;
        });
    }

    /// Records a schedule fire; returns false if this minute already fired
    fn mark_schedule_fired(&self, key: &TriggerKey, now: &NaiveDateTime) -> bool {
        let minute = (now.date(), now.hour(), now.minute());
        let mut fired = self.schedule_fired.lock().unwrap_or_else(PoisonError::into_inner);
        if fired.get(key) == Some(&minute) {
            return false;
        }
        fired.insert(key.clone(), minute);
        true
    }

    /// Stores `current`, returning the previous sample (`None` on the first)
    fn observe_network(&self, current: Option<String>) -> Option<Option<String>> {
        self.last_network
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(current)
    }

    /// Forgets the last sample so the next poll loop starts fresh
    fn forget_network(&self) {
        self.last_network
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

// ============================================================================
// TriggerEngine
// ============================================================================

/// Arms session triggers and dispatches their fires
pub struct TriggerEngine {
    shared: Arc<EngineShared>,
    armed: Mutex<Option<ArmedGeneration>>,
}

impl TriggerEngine {
    pub fn new(
        requester: Arc<dyn ISyncRequester>,
        pause: Arc<PauseController>,
        clock: Arc<dyn IClock>,
        network: Arc<dyn INetworkIdentity>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                requester,
                pause,
                clock,
                network,
                settings: settings.clamped(),
                generation: Mutex::new(0),
                startup_latched: AtomicBool::new(false),
                pending_startups: Mutex::new(HashMap::new()),
                last_network: Mutex::new(None),
                schedule_fired: Mutex::new(HashMap::new()),
            }),
            armed: Mutex::new(None),
        }
    }

    /// Disarms everything, then arms every trigger of every enabled session
    ///
    /// Invalid triggers and paths that cannot be watched are logged and
    /// skipped. Must be called from within a tokio runtime.
    pub fn arm(&self, sessions: &[Session]) {
        let mut slot = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        self.release(&mut slot);

        let generation = *self
            .shared
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let first_pass = !self.shared.startup_latched.load(Ordering::Acquire);

        let mut armed = ArmedGeneration::default();
        let mut wifi_triggers = Vec::new();
        let mut startup_keys = HashSet::new();

        for session in sessions.iter().filter(|s| s.enabled) {
            let mut startup_ordinal = 0;
            for (index, trigger) in session.triggers.iter().enumerate() {
                if let Err(e) = trigger.validate() {
                    warn!(
                        session_id = %session.id,
                        trigger = trigger.kind(),
                        error = %e,
                        "Skipping invalid trigger"
                    );
                    continue;
                }

                let key = (session.id.clone(), index);
                match trigger {
                    Trigger::Schedule(t) => self.arm_schedule(&mut armed, generation, key, t),
                    Trigger::Interval(t) => {
                        self.arm_interval(&mut armed, generation, &session.id, t)
                    }
                    Trigger::FileChange(t) => {
                        self.arm_file_change(&mut armed, generation, &session.id, t)
                    }
                    Trigger::Wifi(t) => wifi_triggers.push((session.id.clone(), t.clone())),
                    Trigger::Startup(t) => {
                        let startup_key = (session.id.clone(), startup_ordinal);
                        startup_ordinal += 1;
                        if self.arm_startup(&mut armed, generation, startup_key.clone(), t, first_pass) {
                            startup_keys.insert(startup_key);
                        }
                    }
                }
            }
        }

        if wifi_triggers.is_empty() {
            // The next poll loop starts from a fresh first sample
            self.shared.forget_network();
        } else {
            self.arm_wifi_poll(&mut armed, generation, wifi_triggers);
        }

        // Startups of removed or disabled sessions are dropped for good
        self.shared
            .pending_startups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| startup_keys.contains(key));
        self.shared.startup_latched.store(true, Ordering::Release);

        info!(
            generation,
            sessions = sessions.len(),
            handles = armed.live_count(),
            "Triggers armed"
        );
        *slot = Some(armed);
    }

    /// Releases every timer, watcher and polling loop; idempotent
    ///
    /// When this returns no trigger armed before the call can dispatch a
    /// sync. Syncs already running are left alone.
    pub fn disarm(&self) {
        let mut slot = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        self.release(&mut slot);
    }

    /// Same as [`arm`](Self::arm); used whenever the collection changes
    pub fn rearm(&self, sessions: &[Session]) {
        self.arm(sessions);
    }

    /// Number of live trigger tasks plus filesystem watchers
    pub fn active_handle_count(&self) -> usize {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, ArmedGeneration::live_count)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn release(&self, slot: &mut Option<ArmedGeneration>) {
        {
            let mut generation = self
                .shared
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *generation += 1;
        }

        if let Some(armed) = slot.take() {
            armed.cancel.cancel();
            for task in &armed.tasks {
                task.abort();
            }
            debug!(
                tasks = armed.tasks.len(),
                watchers = armed.watchers.len(),
                "Triggers disarmed"
            );
        }
    }

    // ------------------------------------------------------------------------
    // Per-trigger arming
    // ------------------------------------------------------------------------

    fn arm_schedule(
        &self,
        armed: &mut ArmedGeneration,
        generation: u64,
        key: TriggerKey,
        trigger: &ScheduleTrigger,
    ) {
        if trigger.is_every_day() && !trigger.days.contains(&ScheduleDay::Daily) {
            debug!(session_id = %key.0, "Schedule lists all seven weekdays, treating as daily");
        }

        let shared = self.shared.clone();
        let cancel = armed.cancel.clone();
        let trigger = trigger.clone();
        armed.tasks.push(tokio::spawn(async move {
            let mut ticker = interval(shared.settings.schedule_check);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = shared.clock.now();
                        if trigger.matches(&now) && shared.mark_schedule_fired(&key, &now) {
                            shared.fire(generation, &key.0, "schedule");
                        }
                    }
                }
            }
        }));
    }

    fn arm_interval(
        &self,
        armed: &mut ArmedGeneration,
        generation: u64,
        id: &SessionId,
        trigger: &IntervalTrigger,
    ) {
        let period = Duration::from_secs(u64::from(trigger.interval_minutes) * 60);
        let shared = self.shared.clone();
        let cancel = armed.cancel.clone();
        let trigger = trigger.clone();
        let id = id.clone();
        armed.tasks.push(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = ClockTime::of(&shared.clock.now());
                        if trigger.in_window(now) {
                            shared.fire(generation, &id, "interval");
                        } else {
                            debug!(session_id = %id, now = %now, "Outside active window, skipping tick");
                        }
                    }
                }
            }
        }));
    }

    fn arm_file_change(
        &self,
        armed: &mut ArmedGeneration,
        generation: u64,
        id: &SessionId,
        trigger: &FileChangeTrigger,
    ) {
        let filter = IgnoreFilter::new(&trigger.ignore_patterns);
        let debounce = Duration::from_millis(trigger.debounce_ms);

        for path in &trigger.watch_paths {
            let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
            let watcher = match watch_path(path, trigger.recursive, tx) {
                Ok(w) => w,
                Err(e) => {
                    warn!(
                        session_id = %id,
                        path = %path.display(),
                        error = %format!("{e:#}"),
                        "Cannot watch path, skipping"
                    );
                    continue;
                }
            };
            armed.watchers.push(watcher);

            let shared = self.shared.clone();
            let id = id.clone();
            armed.tasks.push(tokio::spawn(debounce_changes(
                path.clone(),
                rx,
                filter.clone(),
                debounce,
                armed.cancel.clone(),
                move || shared.fire(generation, &id, "file_change"),
            )));
        }
    }

    fn arm_wifi_poll(
        &self,
        armed: &mut ArmedGeneration,
        generation: u64,
        triggers: Vec<(SessionId, WifiTrigger)>,
    ) {
        debug!(triggers = triggers.len(), "Starting network identity poll");
        let shared = self.shared.clone();
        let cancel = armed.cancel.clone();
        armed.tasks.push(tokio::spawn(async move {
            let mut ticker = interval(shared.settings.wifi_poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let current = shared.network.current().await;
                        match shared.observe_network(current.clone()) {
                            None => debug!(network = ?current, "Initial network identity recorded"),
                            Some(previous) if previous != current => {
                                info!(from = ?previous, to = ?current, "Network identity changed");
                                for (id, trigger) in &triggers {
                                    if trigger.fires_on(previous.as_deref(), current.as_deref()) {
                                        shared.fire(generation, id, "wifi");
                                    }
                                }
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
        }));
    }

    /// Arms a startup trigger; returns false if it must not fire anymore
    fn arm_startup(
        &self,
        armed: &mut ArmedGeneration,
        generation: u64,
        key: StartupKey,
        trigger: &StartupTrigger,
        first_pass: bool,
    ) -> bool {
        let deadline = {
            let mut pending = self
                .shared
                .pending_startups
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if first_pass {
                let deadline = Instant::now() + Duration::from_millis(trigger.delay_ms);
                pending.insert(key.clone(), deadline);
                deadline
            } else {
                match pending.get(&key) {
                    Some(deadline) => *deadline,
                    None => return false,
                }
            }
        };

        let shared = self.shared.clone();
        let cancel = armed.cancel.clone();
        armed.tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep_until(deadline) => shared.fire_startup(generation, &key),
            }
        }));
        true
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        let mut slot = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        self.release(&mut slot);
    }
}
