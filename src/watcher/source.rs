//! Filesystem notification source.
//!
//! Bridges `notify-debouncer-full` callbacks into a tokio channel of
//! [`NotifyEvent`]s. Delivery is best effort; the periodic scan covers
//! anything the backend drops.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{
        event::{ModifyKind, RenameMode},
        EventKind, RecommendedWatcher, RecursiveMode,
    },
    DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache,
};
use tokio::sync::mpsc;

use super::error::WatcherError;

/// Events delivered by a notification source.
#[derive(Debug)]
pub enum NotifyEvent {
    /// Content of a subscribed path changed.
    Changed(PathBuf),
    /// A path appeared in a subscribed directory.
    Created(PathBuf),
    /// The backend reported an error.
    Error(WatcherError),
}

/// Something that can deliver change notifications for subscribed paths.
pub trait NotificationSource: Send {
    /// Start delivering events for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the subscription.
    fn subscribe(&mut self, path: &Path) -> Result<(), WatcherError>;

    /// Stop delivering events for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses to drop the subscription.
    fn unsubscribe(&mut self, path: &Path) -> Result<(), WatcherError>;
}

/// Native notification source backed by inotify, `FSEvents` or
/// `ReadDirectoryChangesW`, with short-window debouncing.
pub struct NotifyWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl NotifyWatcher {
    /// Create a watcher and the receiver its events arrive on.
    ///
    /// The receiver yields `None` once the watcher is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watcher cannot be created.
    pub fn new(
        debounce: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NotifyEvent>), WatcherError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in &events {
                        for converted in Self::convert_event(event) {
                            forward(&event_tx, converted);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        forward(&event_tx, NotifyEvent::Error(WatcherError::Notify(error)));
                    }
                }
            }
        })?;

        Ok((Self { debouncer }, event_rx))
    }

    /// Map one debounced event to zero or more engine events.
    fn convert_event(event: &DebouncedEvent) -> Vec<NotifyEvent> {
        let make: fn(PathBuf) -> NotifyEvent = match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                NotifyEvent::Created
            }
            EventKind::Modify(ModifyKind::Name(_) | ModifyKind::Metadata(_)) => {
                return Vec::new();
            }
            EventKind::Modify(_) => NotifyEvent::Changed,
            // Deletion is not tracked; access and catch-all events carry no data.
            _ => return Vec::new(),
        };

        event.paths.iter().cloned().map(make).collect()
    }
}

/// Send `event` to the engine. Returns `false` once the receiver is gone.
fn forward(tx: &mpsc::UnboundedSender<NotifyEvent>, event: NotifyEvent) -> bool {
    match tx.send(event) {
        Ok(()) => true,
        Err(mpsc::error::SendError(event)) => {
            tracing::debug!(?event, "Event receiver dropped, discarding notification");
            false
        }
    }
}

impl NotificationSource for NotifyWatcher {
    fn subscribe(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.debouncer
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::Subscribe {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn unsubscribe(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.debouncer
            .unwatch(path)
            .map_err(|e| WatcherError::Subscribe {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher").finish_non_exhaustive()
    }
}
