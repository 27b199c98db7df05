//! Periodic discovery of log files in the watch directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::cursor::{Registration, WatchSet};
use super::error::WatcherError;
use super::source::NotificationSource;

/// Notification source shared between the scanner and the driver.
pub type SharedSource = Arc<Mutex<dyn NotificationSource>>;

/// Result of one scan pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Paths registered during this pass.
    pub discovered: Vec<PathBuf>,
    /// Matching paths left for the next pass after an error.
    pub skipped: Vec<PathBuf>,
}

/// Finds files matching the watch pattern and starts tracking new ones.
pub struct FileScanner {
    directory: PathBuf,
    pattern: String,
    source: SharedSource,
}

impl FileScanner {
    /// Create a scanner for `pattern` inside `directory`.
    #[must_use]
    pub fn new(directory: PathBuf, pattern: impl Into<String>, source: SharedSource) -> Self {
        Self {
            directory,
            pattern: pattern.into(),
            source,
        }
    }

    /// List regular files in the directory matching the pattern, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::InvalidPattern`] if the pattern does not
    /// compile. Unreadable entries are logged and skipped.
    pub fn list(&self) -> Result<Vec<PathBuf>, WatcherError> {
        let escaped_dir = glob::Pattern::escape(&self.directory.to_string_lossy());
        let full = Path::new(&escaped_dir).join(&self.pattern);
        let full = full.to_string_lossy();

        let matches = glob::glob(&full).map_err(|e| WatcherError::InvalidPattern {
            pattern: self.pattern.clone(),
            reason: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in matches {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %e.path().display(),
                        error = %e.error(),
                        "Skipping unreadable directory entry"
                    );
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Register every matching file the watch set does not know yet.
    ///
    /// Each new path is subscribed to the notification source before it is
    /// registered. A path whose subscription or registration fails is
    /// skipped and retried on the next scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid; the pass is abandoned.
    pub async fn scan(&self, watch_set: &WatchSet) -> Result<ScanReport, WatcherError> {
        let mut report = ScanReport::default();

        for path in self.list()? {
            if watch_set.contains(&path).await {
                continue;
            }

            if let Err(e) = self.source.lock().await.subscribe(&path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to subscribe to file, retrying next scan"
                );
                report.skipped.push(path);
                continue;
            }

            match watch_set.register(&path).await {
                Ok(Registration::Registered(_)) => {
                    tracing::info!(path = %path.display(), "Tracking new log file");
                    report.discovered.push(path);
                }
                Ok(Registration::AlreadyTracked) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to open log file, retrying next scan"
                    );
                    if let Err(e) = self.source.lock().await.unsubscribe(&path) {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to drop subscription"
                        );
                    }
                    report.skipped.push(path);
                }
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for FileScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileScanner")
            .field("directory", &self.directory)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
