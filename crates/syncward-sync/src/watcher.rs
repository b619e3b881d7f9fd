//! Filesystem watching and debounce for file-change triggers
//!
//! Each watch path gets its own `notify` watcher. The watcher callback runs
//! on a `notify` thread and forwards changed paths into a bounded tokio
//! channel with `try_send`; a full channel drops the path, which is safe
//! because the debounce for that watch path is already pending.
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue / FSEvents
//!       │
//!       ▼
//!  RecommendedWatcher ──→ mpsc::channel ──→ debounce_changes ──→ on_settled()
//!                                              │
//!                                        IgnoreFilter
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Capacity of the per-watch change channel
pub const CHANGE_CHANNEL_CAPACITY: usize = 1024;

// ============================================================================
// IgnoreFilter
// ============================================================================

/// Compiled `ignorePatterns` of a file-change trigger
///
/// A change is ignored if any pattern matches either its path relative to
/// the watch root or its file name. `*` matches any run of characters,
/// including path separators.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<glob::Pattern>,
}

impl IgnoreFilter {
    /// Compiles `patterns`; invalid patterns are logged and skipped
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = p, error = %e, "Skipping invalid ignore pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Returns true if a change to `path` under `root` must not trigger a sync
    pub fn is_ignored(&self, root: &Path, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = path.file_name().map(Path::new);

        self.patterns.iter().any(|pattern| {
            pattern.matches_path(relative) || name.is_some_and(|n| pattern.matches_path(n))
        })
    }
}

// ============================================================================
// Watcher creation
// ============================================================================

/// Starts a `notify` watcher on `path` forwarding changed paths into `tx`
///
/// The watch stops when the returned watcher is dropped.
///
/// # Errors
/// Returns an error if the OS watcher cannot be created or the path cannot
/// be watched (missing path, permissions, watch limit).
pub fn watch_path(
    path: &Path,
    recursive: bool,
    tx: mpsc::Sender<PathBuf>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                for changed in changed_paths(&event) {
                    if tx.try_send(changed).is_err() {
                        // Full or closed; a debounce is already pending or the
                        // trigger was disarmed
                        break;
                    }
                }
            }
            Err(err) => error!(error = %err, "File watcher error"),
        },
        notify::Config::default(),
    )
    .context("Failed to create file watcher")?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(path, mode)
        .with_context(|| format!("Failed to watch path: {}", path.display()))?;

    debug!(path = %path.display(), recursive, "Watching path");
    Ok(watcher)
}

/// Paths of a `notify` event that count as a change
///
/// Access events carry no modification and are dropped.
fn changed_paths(event: &notify::Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => {
            event.paths.clone()
        }
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

// ============================================================================
// Debounce loop
// ============================================================================

/// Coalesces changes under `root` into settled notifications
///
/// Every change that passes `filter` (re)starts a `debounce` timer; when the
/// timer expires without further changes `on_settled` is called once. Runs
/// until `cancel` fires.
pub async fn debounce_changes<F>(
    root: PathBuf,
    mut rx: mpsc::Receiver<PathBuf>,
    filter: IgnoreFilter,
    debounce: Duration,
    cancel: CancellationToken,
    on_settled: F,
) where
    F: Fn(),
{
    let mut deadline: Option<Instant> = None;
    let mut open = true;

    loop {
        let wake_at = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = cancel.cancelled() => break,

            changed = rx.recv(), if open => match changed {
                Some(path) => {
                    if filter.is_ignored(&root, &path) {
                        debug!(path = %path.display(), "Ignoring change");
                        continue;
                    }
                    debug!(path = %path.display(), "Change detected, restarting debounce");
                    deadline = Some(Instant::now() + debounce);
                }
                None => open = false,
            },

            _ = sleep_until(wake_at), if deadline.is_some() => {
                deadline = None;
                debug!(root = %root.display(), "Changes settled");
                on_settled();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn filter(patterns: &[&str]) -> IgnoreFilter {
        IgnoreFilter::new(&patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_ignore_matches_file_name_and_relative_path() {
        let f = filter(&["*.tmp", "build/*", "  "]);
        let root = Path::new("/home/u/docs");

        assert!(f.is_ignored(root, Path::new("/home/u/docs/a/b/report.tmp")));
        assert!(f.is_ignored(root, Path::new("/home/u/docs/build/out.o")));
        assert!(f.is_ignored(root, Path::new("/home/u/docs/build/deep/out.o")));
        assert!(!f.is_ignored(root, Path::new("/home/u/docs/report.txt")));
        assert!(!f.is_ignored(root, Path::new("/home/u/docs/src/build.rs")));
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let f = filter(&["[", "*.swp"]);
        assert!(f.is_ignored(Path::new("/r"), Path::new("/r/.x.swp")));
        assert!(!f.is_ignored(Path::new("/r"), Path::new("/r/[")));
    }

    #[test]
    fn test_empty_filter_ignores_nothing() {
        assert!(!IgnoreFilter::default().is_ignored(Path::new("/r"), Path::new("/r/a")));
    }

    #[test]
    fn test_access_events_are_dropped() {
        let access = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/r/a"));
        assert!(changed_paths(&access).is_empty());

        let create = notify::Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(PathBuf::from("/r/a"));
        assert_eq!(changed_paths(&create), vec![PathBuf::from("/r/a")]);
    }

    fn spawn_debounce(
        patterns: &[&str],
        debounce_ms: u64,
    ) -> (mpsc::Sender<PathBuf>, Arc<AtomicUsize>, CancellationToken) {
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        let fired = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = fired.clone();
        tokio::spawn(debounce_changes(
            PathBuf::from("/r"),
            rx,
            filter(patterns),
            Duration::from_millis(debounce_ms),
            cancel.clone(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));
        (tx, fired, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_fire_once_after_quiet_period() {
        let (tx, fired, _cancel) = spawn_debounce(&[], 500);

        for i in 0..10 {
            tx.send(PathBuf::from(format!("/r/file{i}"))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        // Last change at t=900ms, so nothing may have fired yet
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiet_periods_fire_separately() {
        let (tx, fired, _cancel) = spawn_debounce(&[], 200);

        tx.send(PathBuf::from("/r/a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(PathBuf::from("/r/b")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignored_changes_do_not_fire() {
        let (tx, fired, _cancel) = spawn_debounce(&["*.tmp"], 200);

        tx.send(PathBuf::from("/r/x.tmp")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_debounce() {
        let (tx, fired, cancel) = spawn_debounce(&[], 200);

        tx.send(PathBuf::from("/r/a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
