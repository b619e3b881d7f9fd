//! Session domain entity
//!
//! A [`Session`] is the unit of configuration and state: one local source
//! directory mirrored to one rsync daemon module, the triggers that start a
//! sync, and the outcome of the most recent sync.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::SessionId;
use super::trigger::Trigger;

/// Port used when a connection does not specify one (rsync daemon)
pub const DEFAULT_RSYNC_PORT: u16 = 873;

/// Outcome of the last sync of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// The session has never been synced
    #[default]
    None,
    Success,
    /// The sync completed but rsync reported a partial transfer
    Warning,
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::None => "none",
            SyncStatus::Success => "success",
            SyncStatus::Warning => "warning",
            SyncStatus::Error => "error",
        };
        f.write_str(s)
    }
}

fn default_true() -> bool {
    true
}

/// rsync behaviour switches for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Only transfer files that are missing or newer on the source
    #[serde(default = "default_true")]
    pub update_only: bool,
    #[serde(default)]
    pub delete_on_destination: bool,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub preserve_permissions: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            update_only: true,
            delete_on_destination: false,
            compress: false,
            preserve_permissions: false,
        }
    }
}

/// Where and how to reach the rsync daemon
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConnection {
    pub host: String,
    #[serde(default)]
    pub username: String,
    /// Daemon password; only ever handed to rsync through its environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub module_name: String,
    #[serde(default)]
    pub remote_path: String,
}

impl RemoteConnection {
    /// Port to connect to, falling back to the rsync daemon default
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_RSYNC_PORT)
    }

    /// `rsync://[user@]host:port/` without module or path
    pub fn base_url(&self, with_user: bool) -> String {
        let user = if with_user && !self.username.is_empty() {
            format!("{}@", self.username)
        } else {
            String::new()
        };
        format!("rsync://{}{}:{}/", user, self.host, self.effective_port())
    }

    /// `rsync://user@host:port/module/path` for the given path under the module
    pub fn url_for(&self, remote_path: &str, with_user: bool) -> String {
        let path = remote_path.trim_matches('/');
        let mut url = format!("{}{}/", self.base_url(with_user), self.module_name);
        if !path.is_empty() {
            url.push_str(path);
        }
        url
    }

    /// The session destination derived from this connection
    pub fn destination(&self) -> String {
        self.url_for(&self.remote_path, true)
    }

    /// Returns the password if one is configured and non-empty
    pub fn secret(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for RemoteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnection")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("module_name", &self.module_name)
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

/// A user-defined synchronization session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub source_path: PathBuf,
    /// Derived from `remote_connection`; see [`Session::refresh_destination`]
    #[serde(default)]
    pub destination_path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub sync_options: SyncOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_connection: Option<RemoteConnection>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_status: SyncStatus,
    #[serde(default)]
    pub last_sync_error: Option<String>,
}

impl Session {
    /// Creates an enabled session with no triggers and no remote connection
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id: SessionId::new(),
            name: name.into(),
            source_path: source_path.into(),
            destination_path: String::new(),
            enabled: true,
            paused: false,
            triggers: Vec::new(),
            exclude_patterns: Vec::new(),
            sync_options: SyncOptions::default(),
            remote_connection: None,
            last_sync: None,
            last_sync_status: SyncStatus::None,
            last_sync_error: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteConnection) -> Self {
        self.remote_connection = Some(remote);
        self.refresh_destination();
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Re-derives `destination_path` from the remote connection
    ///
    /// Must be called whenever the session is saved.
    pub fn refresh_destination(&mut self) {
        self.destination_path = self
            .remote_connection
            .as_ref()
            .map(RemoteConnection::destination)
            .unwrap_or_default();
    }

    /// Returns true if the session can be handed to rsync at all
    pub fn is_syncable(&self) -> bool {
        self.remote_connection.is_some()
    }

    /// Records a successful sync
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_sync = Some(at);
        self.last_sync_status = SyncStatus::Success;
        self.last_sync_error = None;
    }

    /// Records a sync that completed with a partial-transfer warning
    pub fn record_warning(&mut self, at: DateTime<Utc>, message: impl Into<String>) {
        self.last_sync = Some(at);
        self.last_sync_status = SyncStatus::Warning;
        self.last_sync_error = Some(message.into());
    }

    /// Records a failed sync
    pub fn record_failure(&mut self, at: DateTime<Utc>, message: impl Into<String>) {
        self.last_sync = Some(at);
        self.last_sync_status = SyncStatus::Error;
        self.last_sync_error = Some(message.into());
    }

    /// Returns true if both sessions would be armed identically
    ///
    /// Ignores the pause flag and last-sync bookkeeping, which change at
    /// runtime without requiring watchers to be re-created.
    pub fn same_definition(&self, other: &Session) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.source_path == other.source_path
            && self.enabled == other.enabled
            && self.triggers == other.triggers
            && self.exclude_patterns == other.exclude_patterns
            && self.sync_options == other.sync_options
            && self.remote_connection == other.remote_connection
    }

    /// Checks the fields a session needs before it can be saved
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("session name cannot be empty".into()));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(DomainError::ValidationFailed("source path cannot be empty".into()));
        }
        if let Some(remote) = &self.remote_connection {
            if remote.host.trim().is_empty() {
                return Err(DomainError::ValidationFailed("remote host cannot be empty".into()));
            }
            if remote.module_name.trim().is_empty() {
                return Err(DomainError::ValidationFailed("remote module cannot be empty".into()));
            }
        }
        for trigger in &self.triggers {
            trigger.validate()?;
        }
        Ok(())
    }
}
