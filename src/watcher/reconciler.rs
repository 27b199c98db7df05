//! Mapping of notification events onto tail work.
//!
//! Dispatch is fire-and-forget, so the reconciler keeps no state between
//! events: every event is decided against the current watch set and the
//! driver returns to waiting immediately.

use std::path::PathBuf;
use std::sync::Arc;

use super::cursor::WatchSet;
use super::source::NotifyEvent;

/// What the driver should do with one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Spawn a tail pass for the path.
    Dispatch(PathBuf),
    /// A pass for the path is queued and has not started; it covers this write.
    Coalesced(PathBuf),
    /// Write on a path the watch set does not know.
    Ignored(PathBuf),
    /// New file; the next scan registers it.
    AwaitScan(PathBuf),
    /// Backend error, already logged.
    SourceError,
}

/// Decides how notifications translate into tail passes.
#[derive(Debug, Clone)]
pub struct ChangeReconciler {
    watch_set: Arc<WatchSet>,
}

impl ChangeReconciler {
    /// Create a reconciler over `watch_set`.
    #[must_use]
    pub fn new(watch_set: Arc<WatchSet>) -> Self {
        Self { watch_set }
    }

    /// Decide the action for `event`.
    ///
    /// A `Dispatch` result marks the path's entry as queued; the driver must
    /// follow it with a tail pass.
    pub async fn reconcile(&self, event: NotifyEvent) -> Reconciliation {
        match event {
            NotifyEvent::Changed(path) => match self.watch_set.get(&path).await {
                Some(entry) if entry.try_queue() => Reconciliation::Dispatch(path),
                Some(_) => Reconciliation::Coalesced(path),
                None => {
                    tracing::debug!(path = %path.display(), "Ignoring write on untracked file");
                    Reconciliation::Ignored(path)
                }
            },
            NotifyEvent::Created(path) => {
                tracing::info!(path = %path.display(), "New file created, deferring to next scan");
                Reconciliation::AwaitScan(path)
            }
            NotifyEvent::Error(e) => {
                tracing::warn!(error = %e, "Notification source error");
                Reconciliation::SourceError
            }
        }
    }
}
