//! FileLogSink - rotated JSON-lines sync log
//!
//! Entries are appended to `<dir>/sync.log`, one JSON object per line. When
//! the active file would grow past `max_bytes` it is shifted to `sync.log.1`
//! (older files move up by one) and files beyond `max_files` are removed.
//!
//! `append` never fails from the caller's point of view: I/O errors are
//! logged via `tracing::warn!` and the entry is dropped, so a full disk can
//! never break a sync.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use syncward_core::ports::{ILogSink, LogEntry};
use thiserror::Error;

/// Name of the active log file inside the log directory
const ACTIVE_FILE: &str = "sync.log";

/// Errors raised while opening the log directory
#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log sink settings: {0}")]
    InvalidSettings(String),
}

struct ActiveFile {
    file: File,
    size: u64,
}

/// [`ILogSink`] writing rotated JSON lines
pub struct FileLogSink {
    dir: PathBuf,
    max_bytes: u64,
    max_files: u32,
    active: Mutex<Option<ActiveFile>>,
}

impl FileLogSink {
    /// Opens (creating if needed) the log directory
    ///
    /// # Arguments
    /// * `dir` - Directory holding `sync.log` and its rotations
    /// * `max_bytes` - Size at which the active file is rotated
    /// * `max_files` - Number of rotated files to keep besides the active one
    pub fn open(dir: impl Into<PathBuf>, max_bytes: u64, max_files: u32) -> Result<Self, LogSinkError> {
        let dir = dir.into();
        if max_bytes == 0 {
            return Err(LogSinkError::InvalidSettings("max_bytes must be greater than 0".into()));
        }
        fs::create_dir_all(&dir).map_err(|source| LogSinkError::Io {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            dir,
            max_bytes,
            max_files,
            active: Mutex::new(None),
        })
    }

    /// Path of the active log file
    pub fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_FILE)
    }

    fn rotated_path(&self, n: u32) -> PathBuf {
        rotated_path(&self.dir, n)
    }

    fn open_active(&self) -> std::io::Result<ActiveFile> {
        let path = self.active_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(ActiveFile { file, size })
    }

    fn rotate(&self) -> std::io::Result<()> {
        if self.max_files == 0 {
            return fs::remove_file(self.active_path());
        }
        let oldest = self.rotated_path(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.max_files).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                fs::rename(&from, self.rotated_path(n + 1))?;
            }
        }
        fs::rename(self.active_path(), self.rotated_path(1))
    }

    fn write_line(&self, line: &[u8]) -> std::io::Result<()> {
        let mut guard = self
            .active
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log sink lock poisoned"))?;

        if guard.is_none() {
            *guard = Some(self.open_active()?);
        }

        let needs_rotation = guard
            .as_ref()
            .is_some_and(|a| a.size > 0 && a.size + line.len() as u64 > self.max_bytes);
        if needs_rotation {
            *guard = None;
            self.rotate()?;
            *guard = Some(self.open_active()?);
        }

        if let Some(active) = guard.as_mut() {
            active.file.write_all(line)?;
            active.file.flush()?;
            active.size += line.len() as u64;
        }
        Ok(())
    }
}

impl ILogSink for FileLogSink {
    fn append(&self, entry: LogEntry) {
        let mut line = match serde_json::to_vec(&entry) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode sync log entry");
                return;
            }
        };
        line.push(b'\n');

        if let Err(e) = self.write_line(&line) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to write sync log entry");
        }
    }
}

fn rotated_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!("{ACTIVE_FILE}.{n}"))
}

/// Reads the sync log in `dir`, oldest entry first
///
/// Walks rotated files from the oldest to the active one. Lines that fail
/// to parse are skipped. Returns an empty list when the directory has no
/// log yet.
pub fn read_entries(dir: &Path) -> Vec<LogEntry> {
    let mut files: Vec<(u32, PathBuf)> = Vec::new();
    if let Ok(read_dir) = fs::read_dir(dir) {
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == ACTIVE_FILE {
                files.push((0, entry.path()));
            } else if let Some(n) = name
                .strip_prefix(ACTIVE_FILE)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|n| n.parse::<u32>().ok())
            {
                files.push((n, entry.path()));
            }
        }
    }
    // Highest rotation number is the oldest
    files.sort_by(|a, b| b.0.cmp(&a.0));

    let mut entries = Vec::new();
    for (_, path) in files {
        let Ok(file) = File::open(&path) else {
            continue;
        };
        for line in BufReader::new(file).lines().map_while(Result::ok) {
            if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                entries.push(entry);
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncward_core::ports::LogLevel;

    #[test]
    fn test_open_rejects_zero_size() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileLogSink::open(dir.path(), 0, 3),
            Err(LogSinkError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_append_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::open(dir.path(), 1024 * 1024, 3).unwrap();

        sink.append(LogEntry::info("first"));
        sink.append(LogEntry::error("second"));

        let raw = fs::read_to_string(sink.active_path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let entries = read_entries(dir.path());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].level, LogLevel::Error);
    }

    #[test]
    fn test_rotation_keeps_max_files() {
        let dir = tempfile::tempdir().unwrap();
        // Small enough that every entry rotates the previous one out
        let sink = FileLogSink::open(dir.path(), 10, 2).unwrap();

        for i in 0..5 {
            sink.append(LogEntry::info(format!("entry {i}")));
        }

        assert!(sink.active_path().exists());
        assert!(rotated_path(dir.path(), 1).exists());
        assert!(rotated_path(dir.path(), 2).exists());
        assert!(!rotated_path(dir.path(), 3).exists());

        let messages: Vec<String> = read_entries(dir.path())
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_read_entries_missing_dir() {
        assert!(read_entries(Path::new("/nonexistent/syncward/logs")).is_empty());
    }
}
