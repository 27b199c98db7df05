//! Configuration file loader.

use std::path::PathBuf;

use super::CollectorConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .log-collector.toml
        search_paths.push(PathBuf::from(".log-collector.toml"));

        // 2. User config directory: ~/.config/log-collector/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("log-collector").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or holds
    /// invalid values.
    pub fn load(&self) -> Result<CollectorConfig, ConfigError> {
        let Some(path) = self.find_config_file() else {
            tracing::debug!("No config file found, using defaults");
            return Ok(CollectorConfig::default());
        };

        tracing::debug!(path = %path.display(), "Loading config file");
        let config = Self::load_from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &PathBuf) -> Result<CollectorConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".log-collector.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config, CollectorConfig::default());
        assert!(loader.find_config_file().is_none());
    }

    #[test]
    fn test_config_loader_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collector.toml");
        std::fs::write(
            &path,
            r#"
                log_directory = "/srv/logs"
                file_pattern = "*.txt"
                poll_interval_secs = 2
                debounce_ms = 250
            "#,
        )
        .unwrap();

        let loader = ConfigLoader::with_path(path.clone());
        let config = loader.load().unwrap();
        assert_eq!(config.log_directory, PathBuf::from("/srv/logs"));
        assert_eq!(config.file_pattern, "*.txt");
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(loader.find_config_file(), Some(path));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();

        let result = ConfigLoader::with_path(path).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_config_loader_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "poll_interval_secs = 0").unwrap();

        let result = ConfigLoader::with_path(path).load();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
