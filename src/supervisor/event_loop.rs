//! Control loop turning raw filesystem events into session cycles.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::supervisor::{ChangeEvent, Session};
use crate::watcher::{ChangeFilter, RawEvent, Verdict};

/// Receives raw events, filters them and dispatches one task per accepted
/// change. Tasks queue on the session lock in arrival order.
pub struct EventLoop {
    session: Arc<Session>,
    filter: ChangeFilter,
    tracker: TaskTracker,
}

impl EventLoop {
    #[must_use]
    pub fn new(session: Arc<Session>, filter: ChangeFilter) -> Self {
        Self {
            session,
            filter,
            tracker: TaskTracker::new(),
        }
    }

    /// Turn a changed path into a `ChangeEvent`, or `None` if it is ignored.
    #[must_use]
    pub fn accept(&self, path: PathBuf) -> Option<ChangeEvent> {
        match self.filter.check(&path) {
            Verdict::Accept => {
                let package = self.session.watch_set().package_for(&path);
                Some(ChangeEvent::new(path, package))
            }
            Verdict::Hidden => {
                tracing::debug!(path = %path.display(), "Ignored changed dot file");
                None
            }
            Verdict::NoMatch => {
                tracing::debug!(path = %path.display(), "Ignored changed file");
                None
            }
        }
    }

    /// Spawn the handler task for an accepted change.
    pub fn dispatch(&self, event: ChangeEvent) {
        let session = Arc::clone(&self.session);
        self.tracker.spawn(async move {
            session.handle_change(event).await;
        });
    }

    /// Run until the event channel closes or `cancel` fires, then wait for
    /// dispatched tasks and stop the supervised process.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<RawEvent>, cancel: CancellationToken) {
        loop {
            tracing::trace!("Main loop iteration");
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(RawEvent::Changed(path)) => {
                        if let Some(change) = self.accept(path) {
                            self.dispatch(change);
                        }
                    }
                    Some(RawEvent::Error(e)) => {
                        tracing::warn!(error = %e, "Watcher error");
                    }
                    None => {
                        tracing::debug!("Watcher channel closed");
                        break;
                    }
                },
            }
        }

        self.session.shutdown_token().cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.session.shutdown().await;
    }
}
