//! Line parsing and service labeling.

use std::path::Path;
use std::sync::Arc;

use super::LogRecord;

/// Policy deriving a service label from a log file path.
pub type ServiceLabeler = Arc<dyn Fn(&Path) -> String + Send + Sync>;

/// Turns one raw line from a log file into a [`LogRecord`].
///
/// Implementations must be pure: the tailing engine may call them from
/// several tasks at once.
pub trait LineParser: Send + Sync {
    /// Parse `line` read from `path`.
    fn parse(&self, path: &Path, line: &str) -> LogRecord;
}

/// Derive a service label from the file's base name, extension stripped.
///
/// Everything from the last `.` of the base name on is removed, so a
/// dot-file such as `.hidden` yields an empty label.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use log_collector::record::service_from_path;
///
/// assert_eq!(service_from_path(Path::new("/var/log/app.log")), "app");
/// assert_eq!(service_from_path(Path::new("/var/log/api.v2.log")), "api.v2");
/// ```
#[must_use]
pub fn service_from_path(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    let name = name.to_string_lossy();
    match name.rfind('.') {
        Some(dot) => name[..dot].to_string(),
        None => name.into_owned(),
    }
}

/// Parser that keeps the raw line as the message.
#[derive(Clone)]
pub struct DefaultParser {
    labeler: ServiceLabeler,
}

impl DefaultParser {
    /// Create a parser using [`service_from_path`] for labels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            labeler: Arc::new(service_from_path),
        }
    }

    /// Create a parser with a custom labeling policy.
    #[must_use]
    pub fn with_labeler(labeler: ServiceLabeler) -> Self {
        Self { labeler }
    }
}

impl Default for DefaultParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultParser").finish_non_exhaustive()
    }
}

impl LineParser for DefaultParser {
    fn parse(&self, path: &Path, line: &str) -> LogRecord {
        LogRecord::new((self.labeler)(path), line)
    }
}
