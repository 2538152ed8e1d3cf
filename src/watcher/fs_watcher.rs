//! Filesystem watcher with notify integration.
//!
//! Watches registered directories non-recursively and forwards changed
//! paths to a tokio channel.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use tokio::sync::mpsc;

use super::WatcherError;

/// Shortest debounce window accepted by the watcher.
pub const MIN_DEBOUNCE: Duration = Duration::from_millis(10);

/// Events emitted by the filesystem watcher.
#[derive(Debug)]
pub enum RawEvent {
    /// A path inside a watched directory was created, modified or removed.
    Changed(PathBuf),
    /// An error occurred during watching.
    Error(WatcherError),
}

/// Something that can start watching a directory.
pub trait DirWatcher: Send + Sync {
    /// Start watching `dir` (non-recursively).
    ///
    /// # Errors
    ///
    /// Returns `WatcherError` if the directory cannot be watched.
    fn watch_dir(&self, dir: &Path) -> Result<(), WatcherError>;
}

/// Watches directories through notify-debouncer-full.
pub struct FsWatcher {
    debouncer: Mutex<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl FsWatcher {
    /// Create a watcher and the receiver for its events.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new(
        debounce: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RawEvent>), WatcherError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let debouncer = new_debouncer(
            debounce.max(MIN_DEBOUNCE),
            None,
            move |result: DebounceEventResult| forward(result, &event_tx),
        )?;

        Ok((
            Self {
                debouncer: Mutex::new(debouncer),
            },
            event_rx,
        ))
    }
}

impl DirWatcher for FsWatcher {
    fn watch_dir(&self, dir: &Path) -> Result<(), WatcherError> {
        let mut debouncer = self
            .debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        debouncer.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::trace!(dir = %dir.display(), "Watching directory");
        Ok(())
    }
}

/// Forward a debounce result to the event channel.
fn forward(result: DebounceEventResult, event_tx: &mpsc::UnboundedSender<RawEvent>) {
    match result {
        Ok(events) => {
            for event in events {
                if !is_change(event.kind) {
                    continue;
                }
                for path in &event.paths {
                    let _ = event_tx.send(RawEvent::Changed(path.clone()));
                }
            }
        }
        Err(errors) => {
            for error in errors {
                let _ = event_tx.send(RawEvent::Error(WatcherError::Notify(error)));
            }
        }
    }
}

/// Whether an event kind alters the tree (reads are ignored).
fn is_change(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
