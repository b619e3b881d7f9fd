//! Domain entities and business logic
//!
//! This module contains the core domain types for Syncward:
//! - Newtypes for session identifiers and wall-clock values
//! - Session definitions and their last-sync state
//! - Trigger definitions and their firing rules
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod session;
pub mod trigger;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::{ClockTime, ScheduleDay, SessionId};
pub use session::{RemoteConnection, Session, SyncOptions, SyncStatus, DEFAULT_RSYNC_PORT};
pub use trigger::{
    FileChangeTrigger, IntervalTrigger, ScheduleTrigger, StartupTrigger, Trigger, WifiTrigger,
};
