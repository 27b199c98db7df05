//! The record emitted for every complete log line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the line was processed, not when it was written.
    pub timestamp: DateTime<Utc>,
    /// Service label, by default the file name without extension.
    pub service: String,
    /// Raw line text without its terminator.
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_timestamp(Utc::now(), service, message)
    }

    /// Create a record with an explicit capture time.
    #[must_use]
    pub fn with_timestamp(
        timestamp: DateTime<Utc>,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            service: service.into(),
            message: message.into(),
        }
    }
}
