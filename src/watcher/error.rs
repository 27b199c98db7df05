//! Tailing engine error types.

use std::path::PathBuf;

/// Errors that can occur while discovering, watching or tailing log files.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Tracked file no longer exists on disk.
    #[error("Watched file deleted: {0}")]
    FileDeleted(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path is not present in the watch set.
    #[error("File not tracked: {0}")]
    NotTracked(PathBuf),

    /// Glob pattern could not be compiled.
    #[error("Invalid file pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Notification source refused a subscription.
    #[error("Failed to subscribe {path}: {reason}")]
    Subscribe { path: PathBuf, reason: String },

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify_debouncer_full::notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    /// Classify an I/O error raised while touching `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileDeleted(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}
