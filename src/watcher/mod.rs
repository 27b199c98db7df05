//! Tailing engine for a directory of append-only log files.
//!
//! A periodic scan registers new files at their current end; filesystem
//! notifications trigger incremental tail passes that push complete lines
//! through the parser into the sink.

mod cursor;
mod driver;
mod error;
mod reconciler;
mod rotation;
mod scanner;
mod source;
mod tailer;

pub use cursor::{Registration, TrackedEntry, TrackedFile, WatchSet};
pub use driver::{ensure_directory, Collector, CollectorError, CollectorSummary};
pub use error::WatcherError;
pub use reconciler::{ChangeReconciler, Reconciliation};
pub use rotation::{decide, FileIdentity, RotationDecision};
pub use scanner::{FileScanner, ScanReport, SharedSource};
pub use source::{NotificationSource, NotifyEvent, NotifyWatcher};
pub use tailer::{TailOutcome, TailReader};
