//! Collector driver: scan timer, notification loop and tail dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::cursor::WatchSet;
use super::error::WatcherError;
use super::reconciler::{ChangeReconciler, Reconciliation};
use super::scanner::{FileScanner, SharedSource};
use super::source::NotifyEvent;
use super::tailer::{TailOutcome, TailReader};
use crate::config::{CollectorConfig, ConfigError};
use crate::record::{LineParser, Sink};

/// Errors that stop the collector from starting.
#[derive(thiserror::Error, Debug)]
pub enum CollectorError {
    /// Watch directory is missing and could not be created, or is unusable.
    #[error("Watch directory {path} unavailable: {source}")]
    WatchDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Notification source could not be set up.
    #[error("Watcher setup failed: {0}")]
    Watcher(#[from] WatcherError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Counters accumulated over one collector run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    /// Files tracked when the run ended.
    pub files_tracked: usize,
    /// Tail passes that completed.
    pub passes: usize,
    /// Tail passes that failed or panicked.
    pub failed_passes: usize,
    /// Writes folded into an already queued pass.
    pub coalesced: usize,
    /// Records accepted by the sink.
    pub records: usize,
    /// Records rejected by the sink.
    pub sink_failures: usize,
}

impl CollectorSummary {
    fn record(&mut self, outcome: &TailOutcome) {
        self.passes += 1;
        self.records += outcome.records;
        self.sink_failures += outcome.sink_failures;
    }
}

type PassResult = (PathBuf, Result<TailOutcome, WatcherError>);

/// Create the watch directory if it does not exist yet.
///
/// # Errors
///
/// Returns [`CollectorError::WatchDirectory`] if creation fails.
pub fn ensure_directory(path: &Path) -> Result<(), CollectorError> {
    if path.is_dir() {
        return Ok(());
    }
    tracing::info!(path = %path.display(), "Watch directory not found, creating it");
    std::fs::create_dir_all(path).map_err(|e| CollectorError::WatchDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Owns the tailing engine for one watch directory.
///
/// One task rescans the directory on a fixed interval; the calling task
/// consumes notifications and spawns tail passes. Passes on the same file
/// are serialized by the watch set, passes on different files run in
/// parallel.
pub struct Collector {
    directory: PathBuf,
    poll_interval: Duration,
    watch_set: Arc<WatchSet>,
    scanner: Arc<FileScanner>,
    reconciler: ChangeReconciler,
    reader: TailReader,
    source: SharedSource,
    cancel: CancellationToken,
}

impl Collector {
    /// Build a collector for `config`.
    ///
    /// The watch directory is resolved to an absolute path so that scanned
    /// paths and notification paths compare equal.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the watch
    /// directory cannot be resolved.
    pub fn new(
        config: &CollectorConfig,
        source: SharedSource,
        parser: Arc<dyn LineParser>,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, CollectorError> {
        config.validate()?;
        let directory = std::fs::canonicalize(&config.log_directory).map_err(|e| {
            CollectorError::WatchDirectory {
                path: config.log_directory.clone(),
                source: e,
            }
        })?;

        let watch_set = Arc::new(WatchSet::new());
        let scanner = Arc::new(FileScanner::new(
            directory.clone(),
            config.file_pattern.clone(),
            Arc::clone(&source),
        ));

        Ok(Self {
            directory,
            poll_interval: config.poll_interval(),
            reconciler: ChangeReconciler::new(Arc::clone(&watch_set)),
            reader: TailReader::new(Arc::clone(&watch_set), parser, sink),
            watch_set,
            scanner,
            source,
            cancel: CancellationToken::new(),
        })
    }

    /// Get the resolved watch directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the shared watch set.
    #[must_use]
    pub fn watch_set(&self) -> Arc<WatchSet> {
        Arc::clone(&self.watch_set)
    }

    /// Get a token that stops the collector when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until `events` closes or the collector is cancelled.
    ///
    /// On shutdown the scan loop stops, no new passes are dispatched, and
    /// passes already in flight run to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch directory cannot be subscribed.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<NotifyEvent>,
    ) -> Result<CollectorSummary, CollectorError> {
        self.source.lock().await.subscribe(&self.directory)?;
        tracing::info!(
            directory = %self.directory.display(),
            interval_secs = self.poll_interval.as_secs_f64(),
            "Collector started"
        );

        let (discovered_tx, mut discovered_rx) = mpsc::unbounded_channel();
        let scan_task = tokio::spawn(scan_loop(
            Arc::clone(&self.scanner),
            Arc::clone(&self.watch_set),
            self.poll_interval,
            discovered_tx,
            self.cancel.child_token(),
        ));

        let mut summary = CollectorSummary::default();
        let mut passes: JoinSet<PassResult> = JoinSet::new();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &mut passes, &mut summary).await,
                    None => {
                        tracing::info!("Notification channel closed, shutting down");
                        break;
                    }
                },
                // Catch-up pass for freshly registered files, closing the gap
                // between their subscription and their insertion.
                Some(path) = discovered_rx.recv() => {
                    self.handle_event(NotifyEvent::Changed(path), &mut passes, &mut summary).await;
                }
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    record_pass(joined, &mut summary);
                }
            }
        }

        self.cancel.cancel();
        if let Err(e) = scan_task.await {
            tracing::warn!(error = %e, "Scan task ended abnormally");
        }

        let in_flight = passes.len();
        if in_flight > 0 {
            tracing::debug!(in_flight, "Draining tail passes");
        }
        while let Some(joined) = passes.join_next().await {
            record_pass(joined, &mut summary);
        }

        summary.files_tracked = self.watch_set.len().await;
        tracing::info!(
            files = summary.files_tracked,
            passes = summary.passes,
            records = summary.records,
            failed_passes = summary.failed_passes,
            sink_failures = summary.sink_failures,
            "Collector stopped"
        );
        Ok(summary)
    }

    async fn handle_event(
        &self,
        event: NotifyEvent,
        passes: &mut JoinSet<PassResult>,
        summary: &mut CollectorSummary,
    ) {
        match self.reconciler.reconcile(event).await {
            Reconciliation::Dispatch(path) => {
                let reader = self.reader.clone();
                passes.spawn(async move {
                    let result = reader.tail(&path).await;
                    (path, result)
                });
            }
            Reconciliation::Coalesced(_) => summary.coalesced += 1,
            Reconciliation::Ignored(_)
            | Reconciliation::AwaitScan(_)
            | Reconciliation::SourceError => {}
        }
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("directory", &self.directory)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

async fn scan_loop(
    scanner: Arc<FileScanner>,
    watch_set: Arc<WatchSet>,
    interval: Duration,
    discovered_tx: mpsc::UnboundedSender<PathBuf>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => match scanner.scan(&watch_set).await {
                Ok(report) => {
                    for path in report.discovered {
                        if let Err(mpsc::error::SendError(path)) = discovered_tx.send(path) {
                            tracing::debug!(
                                path = %path.display(),
                                "Event loop gone, stopping scan loop"
                            );
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Scan failed, retrying next interval");
                }
            },
        }
    }
}

fn record_pass(joined: Result<PassResult, JoinError>, summary: &mut CollectorSummary) {
    match joined {
        Ok((_, Ok(outcome))) => summary.record(&outcome),
        Ok((path, Err(WatcherError::NotTracked(_)))) => {
            tracing::debug!(path = %path.display(), "Tail pass on untracked file");
        }
        Ok((path, Err(e))) => {
            summary.failed_passes += 1;
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Tail pass failed, retrying on next write"
            );
        }
        Err(e) => {
            summary.failed_passes += 1;
            tracing::warn!(error = %e, "Tail pass panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use crate::record::{ChannelSink, DefaultParser};
    use crate::watcher::NotificationSource;

    #[derive(Default)]
    struct NullSource {
        subscribed: Vec<PathBuf>,
    }

    impl NotificationSource for NullSource {
        fn subscribe(&mut self, path: &Path) -> Result<(), WatcherError> {
            self.subscribed.push(path.to_path_buf());
            Ok(())
        }

        fn unsubscribe(&mut self, _path: &Path) -> Result<(), WatcherError> {
            Ok(())
        }
    }

    struct RefusingSource;

    impl NotificationSource for RefusingSource {
        fn subscribe(&mut self, path: &Path) -> Result<(), WatcherError> {
            Err(WatcherError::Subscribe {
                path: path.to_path_buf(),
                reason: "no watches left".to_string(),
            })
        }

        fn unsubscribe(&mut self, _path: &Path) -> Result<(), WatcherError> {
            Ok(())
        }
    }

    fn config_for(dir: &TempDir) -> CollectorConfig {
        CollectorConfig {
            log_directory: dir.path().to_path_buf(),
            poll_interval_secs: 1,
            ..CollectorConfig::default()
        }
    }

    #[test]
    fn test_ensure_directory_creates_missing() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("logs");

        ensure_directory(&nested).unwrap();
        assert!(nested.is_dir());
        // Existing directory is fine too
        ensure_directory(&nested).unwrap();
    }

    #[test]
    fn test_new_rejects_missing_directory() {
        let config = CollectorConfig {
            log_directory: PathBuf::from("/nonexistent/logs-12345"),
            ..CollectorConfig::default()
        };
        let source: SharedSource = Arc::new(Mutex::new(NullSource::default()));
        let (sink, _rx) = ChannelSink::new();

        let result = Collector::new(
            &config,
            source,
            Arc::new(DefaultParser::new()),
            Arc::new(sink),
        );
        assert!(matches!(result, Err(CollectorError::WatchDirectory { .. })));
    }

    #[tokio::test]
    async fn test_run_fails_when_directory_subscription_refused() {
        let dir = TempDir::new().unwrap();
        let source: SharedSource = Arc::new(Mutex::new(RefusingSource));
        let (sink, _rx) = ChannelSink::new();
        let collector = Collector::new(
            &config_for(&dir),
            source,
            Arc::new(DefaultParser::new()),
            Arc::new(sink),
        )
        .unwrap();

        let (_tx, events) = mpsc::unbounded_channel();
        let result = collector.run(events).await;
        assert!(matches!(result, Err(CollectorError::Watcher(_))));
    }

    #[tokio::test]
    async fn test_channel_close_shuts_down_after_draining() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let source = Arc::new(Mutex::new(NullSource::default()));
        let shared: SharedSource = source.clone();
        let (sink, mut rx) = ChannelSink::new();
        let collector = Collector::new(
            &config_for(&dir),
            shared,
            Arc::new(DefaultParser::new()),
            Arc::new(sink),
        )
        .unwrap();
        let canonical = collector.directory().join("app.log");
        let watch_set = collector.watch_set();

        let (tx, events) = mpsc::unbounded_channel();
        let handle = tokio::spawn(collector.run(events));

        // Wait for the initial scan to register the file
        for _ in 0..100 {
            if watch_set.contains(&canonical).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(watch_set.contains(&canonical).await);

        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .unwrap();
            writeln!(file, "hello").unwrap();
        }
        tx.send(NotifyEvent::Changed(canonical.clone())).unwrap();
        drop(tx);

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(summary.files_tracked, 1);
        assert_eq!(summary.records, 1);
        assert_eq!(rx.recv().await.unwrap().message, "hello");

        let source = source.lock().await;
        assert!(source.subscribed.contains(&canonical));
    }

    #[tokio::test]
    async fn test_cancellation_stops_run() {
        let dir = TempDir::new().unwrap();
        let source: SharedSource = Arc::new(Mutex::new(NullSource::default()));
        let (sink, _rx) = ChannelSink::new();
        let collector = Collector::new(
            &config_for(&dir),
            source,
            Arc::new(DefaultParser::new()),
            Arc::new(sink),
        )
        .unwrap();
        let cancel = collector.cancellation_token();

        let (_tx, events) = mpsc::unbounded_channel();
        let handle = tokio::spawn(collector.run(events));
        cancel.cancel();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary.passes, 0);
    }

    #[tokio::test]
    async fn test_scan_loop_stops_when_event_loop_is_gone() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.log"), "").unwrap();

        let source: SharedSource = Arc::new(Mutex::new(NullSource::default()));
        let scanner = Arc::new(FileScanner::new(
            dir.path().to_path_buf(),
            "*.log".to_string(),
            source,
        ));
        let watch_set = Arc::new(WatchSet::new());
        let (discovered_tx, discovered_rx) = mpsc::unbounded_channel();
        drop(discovered_rx);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(scan_loop(
            scanner,
            Arc::clone(&watch_set),
            Duration::from_secs(1),
            discovered_tx,
            cancel.clone(),
        ));

        // Returns after the first scan without being cancelled.
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!cancel.is_cancelled());
        assert_eq!(watch_set.len().await, 1);
    }

    #[test]
    fn test_record_pass_counts() {
        let mut summary = CollectorSummary::default();
        record_pass(
            Ok((
                PathBuf::from("/logs/app.log"),
                Ok(TailOutcome {
                    records: 3,
                    sink_failures: 1,
                    rotated: false,
                    offset: 42,
                }),
            )),
            &mut summary,
        );
        record_pass(
            Ok((
                PathBuf::from("/logs/app.log"),
                Err(WatcherError::FileDeleted(PathBuf::from("/logs/app.log"))),
            )),
            &mut summary,
        );

        assert_eq!(summary.passes, 1);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.sink_failures, 1);
        assert_eq!(summary.failed_passes, 1);
    }
}
