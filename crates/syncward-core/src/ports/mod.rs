//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! scheduler core. Ports are interfaces that the core depends on, but whose
//! implementations live in adapter crates or are injected by tests.
//!
//! ## Ports Overview
//!
//! - [`ISessionStore`] - Persistence of the flat session collection
//! - [`ICommandRunner`] - Runs the external rsync subprocess
//! - [`ILogSink`] - Durable structured sync log
//! - [`ISyncNotifier`] - Fire-and-forget sync lifecycle notifications
//! - [`INetworkIdentity`] - Current wireless network name
//! - [`IClock`] - Local wall-clock time

pub mod clock;
pub mod command_runner;
pub mod log_sink;
pub mod network;
pub mod notification;
pub mod session_store;

pub use clock::{IClock, SystemClock};
pub use command_runner::{CommandOutput, CommandSpec, ICommandRunner};
pub use log_sink::{ILogSink, LogEntry, LogLevel};
pub use network::INetworkIdentity;
pub use notification::{ISyncNotifier, Notification, NotificationPriority, SyncEvent};
pub use session_store::ISessionStore;
