//! Change notifications for the tracked file.
//!
//! Two strategies are available:
//! - **Native**: OS-level notifications through the `notify` crate, watching
//!   the file's parent directory so a truncated or recreated file still
//!   produces events.
//! - **Poll**: no notifications at all; the owner simply re-checks the file
//!   every poll interval. Use this on NFS and other network shares.
//!
//! `Auto` tries native first and falls back to polling.

use crossbeam_channel::{never, unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::config::WatchMode;
use crate::error::TailError;

/// What the watcher tells its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Something happened to the watched file; look at it again
    Changed,
    /// The notification backend itself broke
    Failed(String),
}

/// Notification source for one tracked-file lifetime
pub struct ChangeWatcher {
    // Kept alive for as long as notifications are wanted
    _native: Option<RecommendedWatcher>,
    signals: Receiver<WatchSignal>,
    backend: &'static str,
}

impl ChangeWatcher {
    pub fn new(path: &Path, mode: WatchMode) -> Result<Self, TailError> {
        match mode {
            WatchMode::Native => Self::native(path),
            WatchMode::Poll => Ok(Self::poll()),
            WatchMode::Auto => match Self::native(path) {
                Ok(watcher) => {
                    tracing::info!("Using native file system watcher");
                    Ok(watcher)
                }
                Err(e) => {
                    tracing::warn!(
                        "Native file watching unavailable ({}), falling back to polling",
                        e
                    );
                    Ok(Self::poll())
                }
            },
        }
    }

    fn poll() -> Self {
        Self {
            _native: None,
            signals: never(),
            backend: "poll",
        }
    }

    /// Watcher driven by a caller-owned channel instead of a backend
    #[cfg(test)]
    pub(crate) fn from_signals(signals: Receiver<WatchSignal>) -> Self {
        Self {
            _native: None,
            signals,
            backend: "manual",
        }
    }

    fn native(path: &Path) -> Result<Self, TailError> {
        let target = path.to_path_buf();
        let watch_dir = parent_dir(path);
        let (tx, rx) = unbounded();

        let callback_target = target.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let signal = match res {
                    Ok(event) if concerns(&event, &callback_target) => WatchSignal::Changed,
                    Ok(_) => return,
                    Err(e) => WatchSignal::Failed(e.to_string()),
                };
                let _ = tx.send(signal);
            },
            Config::default(),
        )
        .map_err(|e| TailError::watch(&target, format!("initialization failed: {}", e)))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| TailError::watch(&target, e.to_string()))?;

        Ok(Self {
            _native: Some(watcher),
            signals: rx,
            backend: "native",
        })
    }

    /// Signals from the backend. Never yields anything in poll mode.
    pub fn signals(&self) -> &Receiver<WatchSignal> {
        &self.signals
    }

    pub fn is_native(&self) -> bool {
        self._native.is_some()
    }

    /// Name of the backend for logging
    pub fn backend_name(&self) -> &'static str {
        self.backend
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Does a notification concern the tracked file?
fn concerns(event: &Event, target: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    // Some backends report events without paths; re-checking is harmless
    event.paths.is_empty()
        || event
            .paths
            .iter()
            .any(|p| p == target || p.file_name() == target.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::time::Duration;

    #[test]
    fn test_poll_mode_has_no_signals() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = ChangeWatcher::new(&dir.path().join("chat.txt"), WatchMode::Poll).unwrap();

        assert!(!watcher.is_native());
        assert_eq!(watcher.backend_name(), "poll");
        assert!(watcher
            .signals()
            .recv_timeout(Duration::from_millis(20))
            .is_err());
    }

    #[test]
    fn test_auto_mode_always_yields_a_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        std::fs::write(&path, "").unwrap();

        let watcher = ChangeWatcher::new(&path, WatchMode::Auto).unwrap();
        assert!(["native", "poll"].contains(&watcher.backend_name()));
    }

    #[test]
    fn test_native_mode_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("chat.txt");

        let err = ChangeWatcher::new(&path, WatchMode::Native).err().unwrap();
        assert!(matches!(err, TailError::Watch { .. }));
    }

    #[test]
    fn test_concerns_filters_by_file() {
        let target = PathBuf::from("/logs/Fleet_20240301.txt");

        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(target.clone());
        assert!(concerns(&modify, &target));

        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/logs/Local_20240301.txt"));
        assert!(!concerns(&other, &target));

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(target.clone());
        assert!(!concerns(&access, &target));
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("chat.txt")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/a/chat.txt")), PathBuf::from("/a"));
    }
}
