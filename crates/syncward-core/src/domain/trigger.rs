//! Trigger domain types
//!
//! A [`Trigger`] describes one condition under which a session should be
//! synchronized. The firing *decisions* live here as pure functions over
//! wall-clock values and network identities so they can be tested without
//! timers; the sync crate owns the timers and watchers that feed them.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ClockTime, ScheduleDay};

/// Fire at a wall-clock minute on selected days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrigger {
    pub time: ClockTime,
    pub days: Vec<ScheduleDay>,
}

impl ScheduleTrigger {
    /// Returns true if the schedule covers every day of the week
    ///
    /// Either an explicit `daily` entry or all seven weekdays listed.
    pub fn is_every_day(&self) -> bool {
        self.days.contains(&ScheduleDay::Daily)
            || ScheduleDay::WEEK.iter().all(|d| self.days.contains(d))
    }

    /// Returns true if the trigger should fire during the minute of `now`
    pub fn matches(&self, now: &NaiveDateTime) -> bool {
        if ClockTime::of(now) != self.time {
            return false;
        }
        self.is_every_day() || self.days.iter().any(|d| d.covers(now.weekday()))
    }
}

/// Fire every `interval_minutes`, optionally only inside an active window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalTrigger {
    pub interval_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<ClockTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<ClockTime>,
}

impl IntervalTrigger {
    /// The active window, present only when both bounds are set
    pub fn active_window(&self) -> Option<(ClockTime, ClockTime)> {
        self.start_time.zip(self.end_time)
    }

    /// Returns true if a tick at `now` should request a sync
    ///
    /// The window is start-inclusive and end-exclusive. A window whose start
    /// is not before its end never matches.
    pub fn in_window(&self, now: ClockTime) -> bool {
        match self.active_window() {
            Some((start, end)) => start <= now && now < end,
            None => true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    1000
}

/// Fire after file-system changes under the watched paths settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeTrigger {
    pub watch_paths: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

/// Fire when joining or leaving a wireless network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiTrigger {
    pub ssid: String,
    #[serde(default = "default_true")]
    pub on_connect: bool,
}

impl WifiTrigger {
    /// Returns true if a network identity change from `prev` to `curr` fires
    pub fn fires_on(&self, prev: Option<&str>, curr: Option<&str>) -> bool {
        let ssid = Some(self.ssid.as_str());
        if self.on_connect {
            curr == ssid
        } else {
            prev == ssid && curr != ssid
        }
    }
}

/// Fire once, shortly after the scheduler first starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupTrigger {
    #[serde(default)]
    pub delay_ms: u64,
}

/// One condition under which a session is synchronized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Trigger {
    Schedule(ScheduleTrigger),
    Interval(IntervalTrigger),
    FileChange(FileChangeTrigger),
    Wifi(WifiTrigger),
    Startup(StartupTrigger),
}

impl Trigger {
    /// Short name of the trigger kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Schedule(_) => "schedule",
            Trigger::Interval(_) => "interval",
            Trigger::FileChange(_) => "file_change",
            Trigger::Wifi(_) => "wifi",
            Trigger::Startup(_) => "startup",
        }
    }

    /// Checks that the trigger parameters are usable
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |msg: &str| Err(DomainError::InvalidTrigger(msg.to_string()));
        match self {
            Trigger::Schedule(t) if t.days.is_empty() => invalid("schedule has no days"),
            Trigger::Interval(t) if t.interval_minutes == 0 => {
                invalid("interval minutes must be greater than 0")
            }
            Trigger::Interval(t) if t.start_time.is_some() != t.end_time.is_some() => {
                invalid("interval window needs both a start and an end time")
            }
            Trigger::FileChange(t) if t.watch_paths.is_empty() => {
                invalid("file change trigger has no watch paths")
            }
            Trigger::FileChange(t) if t.debounce_ms == 0 => {
                invalid("debounce must be greater than 0 ms")
            }
            Trigger::Wifi(t) if t.ssid.trim().is_empty() => invalid("wifi ssid cannot be empty"),
            _ => Ok(()),
        }
    }
}
