//! Sync notification port (driven/secondary port)
//!
//! The scheduler reports the lifecycle of every sync (started, finished,
//! failed) and every change of the session collection through this port.
//! How that reaches the user (tray icon, desktop notification, IPC to a
//! window) is up to the adapter.
//!
//! ## Design Notes
//!
//! - Notifications are fire-and-forget. `notify` is synchronous and must
//!   return quickly; the core logs a failure and carries on.
//! - [`SyncEvent::to_notification`] maps an event onto a desktop-style
//!   [`Notification`] for adapters that only need title/body/priority.

use serde::{Deserialize, Serialize};

use crate::domain::{SessionId, SyncStatus};

// ============================================================================
// Notification struct and NotificationPriority enum
// ============================================================================

/// Priority level for a notification
///
/// Maps to urgency levels in notification systems (e.g., libnotify urgency).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A notification to display to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Title of the notification (short, descriptive)
    pub title: String,
    /// Body text with details about the event
    pub body: String,
    pub priority: NotificationPriority,
    /// Category for grouping/filtering (e.g., "sync", "error")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates a low-priority sync progress notification
    pub fn sync(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::Low)
            .with_category("sync")
    }

    /// Creates an error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }
}

// ============================================================================
// SyncEvent
// ============================================================================

/// Lifecycle events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A sync of the session is about to start
    Started { session_id: SessionId, name: String },
    /// A sync ended; emitted after both successful and failed syncs
    Finished {
        session_id: SessionId,
        name: String,
        status: SyncStatus,
    },
    /// A sync failed with a user-facing message
    Failed {
        session_id: SessionId,
        name: String,
        message: String,
    },
    /// The session collection was replaced
    SessionsUpdated { count: usize },
}

impl SyncEvent {
    /// The session the event refers to, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SyncEvent::Started { session_id, .. }
            | SyncEvent::Finished { session_id, .. }
            | SyncEvent::Failed { session_id, .. } => Some(session_id),
            SyncEvent::SessionsUpdated { .. } => None,
        }
    }

    /// Desktop-style rendering of the event
    pub fn to_notification(&self) -> Notification {
        match self {
            SyncEvent::Started { name, .. } => {
                Notification::sync("Sync started", format!("Synchronizing '{name}'"))
            }
            SyncEvent::Finished { name, status, .. } => Notification::sync(
                "Sync finished",
                format!("'{name}' finished with status {status}"),
            ),
            SyncEvent::Failed { name, message, .. } => {
                Notification::error(format!("Sync failed: {name}"), message.clone())
            }
            SyncEvent::SessionsUpdated { count } => Notification::new(
                "Sessions updated",
                format!("{count} session(s) configured"),
            )
            .with_priority(NotificationPriority::Low),
        }
    }
}

// ============================================================================
// ISyncNotifier trait
// ============================================================================

/// Port trait for sync lifecycle notifications
///
/// Implementations should handle delivery failures (e.g. a missing
/// notification daemon or a closed channel) gracefully; any error returned
/// is logged by the caller and otherwise ignored.
pub trait ISyncNotifier: Send + Sync {
    fn notify(&self, event: &SyncEvent) -> anyhow::Result<()>;
}
