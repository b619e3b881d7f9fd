//! JSON file session store
//!
//! The collection is one pretty-printed JSON array. Scheduler-wide state
//! (the global pause flag) lives in a sibling `<stem>.state.json`. Writes go
//! to a temporary file which is then renamed over the target, so readers
//! never observe a half-written file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use syncward_core::{domain::Session, ports::ISessionStore};
use tracing::{debug, warn};

/// Contents of the scheduler state file
#[derive(Debug, Default, Serialize, Deserialize)]
struct SchedulerState {
    #[serde(default)]
    paused: bool,
}

/// [`ISessionStore`] backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    /// Creates a store for the file at `path` (which need not exist yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the scheduler state file path, e.g. `sessions.state.json`
    pub fn state_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_stem()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sessions".into());
        name.push(".state.json");
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.path)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "sessions.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `bytes` to a sibling temp file and renames it over `path`
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let tmp = temp_path_for(path);
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))
}

#[async_trait::async_trait]
impl ISessionStore for JsonSessionStore {
    async fn load(&self) -> Vec<Session> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No session file yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<Session>>(&content) {
            Ok(sessions) => {
                debug!(path = %self.path.display(), count = sessions.len(), "Loaded sessions");
                sessions
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Session file is corrupt, starting with an empty collection"
                );
                Vec::new()
            }
        }
    }

    async fn save(&self, sessions: &[Session]) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions).context("Failed to encode sessions")?;
        write_atomic(&self.path, json.as_bytes()).await?;

        debug!(path = %self.path.display(), count = sessions.len(), "Saved sessions");
        Ok(())
    }

    async fn load_paused(&self) -> bool {
        let path = self.state_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<SchedulerState>(&content) {
                Ok(state) => state.paused,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Scheduler state is corrupt, assuming not paused");
                    false
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read scheduler state");
                false
            }
        }
    }

    async fn save_paused(&self, paused: bool) -> Result<()> {
        let path = self.state_path();
        let json = serde_json::to_string_pretty(&SchedulerState { paused })
            .context("Failed to encode scheduler state")?;
        write_atomic(&path, json.as_bytes()).await?;

        debug!(path = %path.display(), paused, "Saved scheduler state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(dir.path().join("sessions.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonSessionStore::new(&path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.json");
        let store = JsonSessionStore::new(&path);

        store
            .save(&[Session::new("docs", "/tmp/src")])
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('['));
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let store = JsonSessionStore::new("/a/b/sessions.json");
        assert_eq!(store.temp_path(), PathBuf::from("/a/b/sessions.json.tmp"));
        assert_eq!(store.state_path(), PathBuf::from("/a/b/sessions.state.json"));
    }

    #[tokio::test]
    async fn test_global_pause_is_kept_apart_from_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(dir.path().join("sessions.json"));
        let mut docs = Session::new("docs", "/tmp/src");
        docs.paused = true;
        store.save(&[docs]).await.unwrap();

        assert!(!store.load_paused().await);
        store.save_paused(true).await.unwrap();
        assert!(store.load_paused().await);
        store.save_paused(false).await.unwrap();
        assert!(!store.load_paused().await);

        assert!(store.load().await[0].paused);
        assert!(!temp_path_for(&store.state_path()).exists());
    }

    #[tokio::test]
    async fn test_corrupt_state_file_is_not_paused() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(dir.path().join("sessions.json"));
        std::fs::write(store.state_path(), "paused").unwrap();

        assert!(!store.load_paused().await);
    }
}
