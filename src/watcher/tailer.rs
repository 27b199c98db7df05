//! Incremental log file reader.
//!
//! Reads complete lines appended since the last pass and hands them to the
//! parser and sink. An unterminated trailing fragment is left in place so
//! it is emitted whole once its newline arrives.

use std::borrow::Cow;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

use super::cursor::{TrackedFile, WatchSet};
use super::error::WatcherError;
use super::rotation::{decide, FileIdentity, RotationDecision};
use crate::record::{LineParser, Sink};

/// Summary of a single tail pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TailOutcome {
    /// Records accepted by the sink.
    pub records: usize,
    /// Records the sink rejected.
    pub sink_failures: usize,
    /// The pass started over from byte 0.
    pub rotated: bool,
    /// Stored offset after the pass.
    pub offset: u64,
}

/// Performs tail passes against entries of a [`WatchSet`].
#[derive(Clone)]
pub struct TailReader {
    watch_set: Arc<WatchSet>,
    parser: Arc<dyn LineParser>,
    sink: Arc<dyn Sink>,
}

impl TailReader {
    /// Create a reader emitting through `parser` into `sink`.
    #[must_use]
    pub fn new(watch_set: Arc<WatchSet>, parser: Arc<dyn LineParser>, sink: Arc<dyn Sink>) -> Self {
        Self {
            watch_set,
            parser,
            sink,
        }
    }

    /// Read everything appended to `path` since the previous pass.
    ///
    /// Waits for any in-flight pass on the same path, so passes on one file
    /// never overlap.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not tracked, or if the file cannot be
    /// stat'ed, reopened or seeked. The stored offset is left untouched so the
    /// same bytes are retried on the next trigger.
    pub async fn tail(&self, path: &Path) -> Result<TailOutcome, WatcherError> {
        let entry = self
            .watch_set
            .get(path)
            .await
            .ok_or_else(|| WatcherError::NotTracked(path.to_path_buf()))?;

        let mut file = entry.lock().await;
        entry.start_pass();
        self.read_pass(&mut file).await
    }

    async fn read_pass(&self, file: &mut TrackedFile) -> Result<TailOutcome, WatcherError> {
        let path = file.path().to_path_buf();
        let mut outcome = TailOutcome::default();

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| WatcherError::from_io(&path, e))?;
        let mut current_size = metadata.len();

        let replaced = FileIdentity::of(&metadata) != file.identity();
        let truncated =
            decide(file.offset(), current_size) == RotationDecision::ResetAndReadFromStart;
        if replaced || truncated {
            tracing::warn!(
                path = %path.display(),
                old_offset = file.offset(),
                new_len = current_size,
                replaced,
                "File rotated, resetting offset to 0"
            );
            let handle = File::open(&path)
                .await
                .map_err(|e| WatcherError::from_io(&path, e))?;
            // Stat the new handle itself; the path may have moved on again.
            let metadata = handle
                .metadata()
                .await
                .map_err(|e| WatcherError::from_io(&path, e))?;
            current_size = metadata.len();
            file.replace_handle(handle, FileIdentity::of(&metadata));
            file.reset();
            outcome.rotated = true;
        }
        file.observe_size(current_size);

        let start = file.offset();
        outcome.offset = start;
        if current_size == start {
            return Ok(outcome);
        }

        file.handle_mut()
            .seek(SeekFrom::Start(start))
            .await
            .map_err(|e| WatcherError::from_io(&path, e))?;

        let mut reader = BufReader::new(file.handle_mut());
        let mut consumed = start;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let bytes_read = match reader.read_until(b'\n', &mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        offset = consumed,
                        error = %e,
                        "Read failed mid-pass, keeping progress so far"
                    );
                    break;
                }
            };

            // EOF, or a fragment still waiting for its newline.
            if bytes_read == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            consumed += bytes_read as u64;

            let line = decode_line(&buf);
            let record = self.parser.parse(&path, &line);
            match self.sink.accept(record).await {
                Ok(()) => outcome.records += 1,
                Err(e) => {
                    outcome.sink_failures += 1;
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Sink rejected record"
                    );
                }
            }
        }
        drop(reader);

        file.advance(consumed);
        outcome.offset = consumed;

        tracing::trace!(
            path = %path.display(),
            offset = consumed,
            records = outcome.records,
            "Tail pass complete"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for TailReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailReader").finish_non_exhaustive()
    }
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily.
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}
