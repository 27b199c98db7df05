//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Configuration for the log collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Directory holding the log files to tail.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    /// Glob matched against file names inside the directory.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
    /// Seconds between directory rescans.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Debounce window for filesystem notifications, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_file_pattern() -> String {
    "*.log".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            log_directory: default_log_directory(),
            file_pattern: default_file_pattern(),
            poll_interval_secs: default_poll_interval_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl CollectorConfig {
    /// Interval between directory rescans.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Notification debounce window.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero poll interval, a zero
    /// debounce window or an empty file pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid(
                "debounce_ms must be greater than 0".to_string(),
            ));
        }
        if self.file_pattern.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "file_pattern must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_config_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.log_directory, PathBuf::from("./logs"));
        assert_eq!(config.file_pattern, "*.log");
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collector_config_deserialize_partial() {
        let toml = r#"
            log_directory = "/var/log/myapp"
            poll_interval_secs = 3
        "#;
        let config: CollectorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.log_directory, PathBuf::from("/var/log/myapp"));
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.file_pattern, "*.log");
        assert_eq!(config.debounce_ms, 100);
    }

    #[test]
    fn test_zero_interval_is_invalid() {
        let config = CollectorConfig {
            poll_interval_secs: 0,
            ..CollectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_debounce_is_invalid() {
        let config: CollectorConfig = toml::from_str("debounce_ms = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = CollectorConfig {
            debounce_ms: 1,
            ..CollectorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_pattern_is_invalid() {
        let config = CollectorConfig {
            file_pattern: "  ".to_string(),
            ..CollectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
