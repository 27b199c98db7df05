//! Log Collector - tails a directory of log files into a record sink.

pub mod config;
pub mod record;
pub mod watcher;
