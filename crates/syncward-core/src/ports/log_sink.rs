//! Log sink port (driven/secondary port)
//!
//! Every sync invocation produces a small structured log: the command line,
//! the tool's output, transfer statistics and the final outcome. Entries
//! belonging to one invocation share an `invocation_id`.
//!
//! ## Design Notes
//!
//! - `append` is synchronous and infallible from the caller's point of view;
//!   sinks deal with their own I/O failures.
//! - Diagnostic tracing is separate from this trail and goes through
//!   `tracing` as usual.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::SessionId;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// One structured line in the sync log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// Groups the entries of a single sync invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<Uuid>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            session_id: None,
            session_name: None,
            invocation_id: None,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_session(mut self, id: &SessionId, name: &str) -> Self {
        self.session_id = Some(id.clone());
        self.session_name = Some(name.to_string());
        self
    }

    pub fn with_invocation(mut self, invocation_id: Uuid) -> Self {
        self.invocation_id = Some(invocation_id);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Port trait for the durable sync log
pub trait ILogSink: Send + Sync {
    /// Appends one entry; must not block for long and must not panic
    fn append(&self, entry: LogEntry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let id = SessionId::parse("s1").unwrap();
        let inv = Uuid::new_v4();
        let entry = LogEntry::info("Sync started")
            .with_session(&id, "docs")
            .with_invocation(inv)
            .with_details(json!({"files": 3}));

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.session_id, Some(id));
        assert_eq!(entry.session_name.as_deref(), Some("docs"));
        assert_eq!(entry.invocation_id, Some(inv));
        assert_eq!(entry.details["files"], 3);
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(LogEntry::error("boom")).unwrap();
        assert_eq!(json["level"], "error");
        assert!(json.get("session_id").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
