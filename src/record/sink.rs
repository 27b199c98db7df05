//! Downstream record sinks.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use super::LogRecord;

/// Errors a sink may report for a single record.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// Record could not be encoded.
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Output could not be written.
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Receiving side has gone away.
    #[error("Sink closed")]
    Closed,
}

/// Consumer of emitted records.
///
/// The engine logs and drops records the sink rejects; it never retries.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Accept one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be delivered.
    async fn accept(&self, record: LogRecord) -> Result<(), SinkError>;
}

/// Writes each record as one JSON object per line, to stdout by default.
///
/// Writes go through tokio's async I/O, so a slow consumer on the other end
/// of a pipe never blocks a runtime worker. The writer sits behind a mutex
/// so lines from concurrent passes never interleave.
#[derive(Debug)]
pub struct ConsoleSink<W = tokio::io::Stdout> {
    writer: Mutex<W>,
}

impl ConsoleSink {
    /// Create a console sink writing to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a console sink writing to `writer`.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return its writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Sink for ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn accept(&self, record: LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Forwards records into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl ChannelSink {
    /// Create a sink and the receiver its records arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn accept(&self, record: LogRecord) -> Result<(), SinkError> {
        self.tx.send(record).map_err(|_| SinkError::Closed)
    }
}
