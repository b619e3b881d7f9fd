//! Wall-clock port
//!
//! Schedule and interval-window decisions are made against local wall-clock
//! time. Reading it through a port lets tests drive a simulated clock.

use chrono::{Local, NaiveDateTime};

/// Source of the current local date and time
pub trait IClock: Send + Sync {
    /// Current local wall-clock time (no timezone attached)
    fn now(&self) -> NaiveDateTime;
}

/// [`IClock`] backed by the operating system's local time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
