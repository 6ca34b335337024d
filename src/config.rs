//! Configuration management for memex
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::algorithms::FifoAlgorithm;
use crate::error::{MemexError, Result};
use crate::history::HistoryManager;
use crate::storage::{MemoryStorage, SqliteStorage, Storage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Backends accepted in `storage.backend`
pub const VALID_BACKENDS: [&str; 2] = ["sqlite", "memory"];

/// Main configuration structure for memex
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Context window configuration
    #[serde(default)]
    pub algorithm: AlgorithmConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to use (sqlite, memory)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database file for the sqlite backend
    ///
    /// Defaults to `history.db` in the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Per-thread capacity cap; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            max_messages: None,
        }
    }
}

/// Context window configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// FIFO window size; reads are not windowed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MemexError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MemexError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(backend) = std::env::var("MEMEX_STORAGE_BACKEND") {
            self.storage.backend = backend;
        }

        if let Ok(path) = std::env::var("MEMEX_DB_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(max_messages) = std::env::var("MEMEX_MAX_MESSAGES") {
            if let Ok(value) = max_messages.parse() {
                self.storage.max_messages = Some(value);
            } else {
                tracing::warn!("Invalid MEMEX_MAX_MESSAGES: {}", max_messages);
            }
        }

        if let Ok(window) = std::env::var("MEMEX_WINDOW") {
            if let Ok(value) = window.parse() {
                self.algorithm.window = Some(value);
            } else {
                tracing::warn!("Invalid MEMEX_WINDOW: {}", window);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(db) = &cli.db {
            tracing::debug!("Using database override from CLI: {}", db.display());
            self.storage.path = Some(db.clone());
        }
        if let Some(max_messages) = cli.max_messages {
            self.storage.max_messages = Some(max_messages);
        }
        if let Some(window) = cli.window {
            self.algorithm.window = Some(window);
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `MemexError::Config` if any check fails
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend.is_empty() {
            return Err(MemexError::Config("Storage backend cannot be empty".to_string()).into());
        }

        if !VALID_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(MemexError::Config(format!(
                "Invalid storage backend: {}. Must be one of: {}",
                self.storage.backend,
                VALID_BACKENDS.join(", ")
            ))
            .into());
        }

        if self.storage.max_messages == Some(0) {
            return Err(MemexError::Config(
                "storage.max_messages must be greater than 0".to_string(),
            )
            .into());
        }

        if self.algorithm.window == Some(0) {
            return Err(
                MemexError::Config("algorithm.window must be greater than 0".to_string()).into(),
            );
        }

        if let Some(path) = &self.storage.path {
            if path.as_os_str().is_empty() {
                return Err(
                    MemexError::Config("storage.path cannot be empty".to_string()).into(),
                );
            }
        }

        Ok(())
    }

    /// Construct the configured storage backend
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown backend or if the backend cannot be
    /// initialized.
    pub fn build_storage(&self) -> Result<Box<dyn Storage>> {
        let max_messages = self.storage.max_messages;
        match self.storage.backend.as_str() {
            "memory" => Ok(Box::new(MemoryStorage::with_capacity(max_messages)?)),
            "sqlite" => {
                let path = match &self.storage.path {
                    Some(path) => path.clone(),
                    None => SqliteStorage::default_path()?,
                };
                tracing::debug!(path = %path.display(), "opening sqlite storage");
                Ok(Box::new(SqliteStorage::with_options(path, max_messages)?))
            }
            other => Err(MemexError::Config(format!("Unknown storage backend: {}", other)).into()),
        }
    }

    /// Construct the configured window algorithm, if any
    pub fn build_algorithm(&self) -> Result<Option<FifoAlgorithm>> {
        self.algorithm.window.map(FifoAlgorithm::new).transpose()
    }

    /// Construct a history manager over the configured backend and window
    pub fn build_manager(&self) -> Result<HistoryManager<Box<dyn Storage>>> {
        let storage = self.build_storage()?;
        Ok(match self.build_algorithm()? {
            Some(algorithm) => HistoryManager::with_algorithm(storage, algorithm),
            None => HistoryManager::new(storage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::error::{kind_of, ErrorKind};
    use serial_test::serial;

    fn cli_with(db: Option<PathBuf>, max_messages: Option<usize>, window: Option<usize>) -> Cli {
        Cli {
            config: None,
            verbose: false,
            db,
            max_messages,
            window,
            command: Commands::List {
                limit: 10,
                offset: 0,
                json: false,
            },
        }
    }

    fn clear_env() {
        for var in [
            "MEMEX_STORAGE_BACKEND",
            "MEMEX_DB_PATH",
            "MEMEX_MAX_MESSAGES",
            "MEMEX_WINDOW",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.backend, "sqlite");
        assert!(config.storage.path.is_none());
        assert!(config.storage.max_messages.is_none());
        assert!(config.algorithm.window.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
storage:
  backend: memory
  max_messages: 500
algorithm:
  window: 50
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.max_messages, Some(500));
        assert_eq!(config.algorithm.window, Some(50));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("algorithm:\n  window: 3\n").unwrap();
        assert_eq!(config.storage, StorageConfig::default());
        assert_eq!(config.algorithm.window, Some(3));
    }

    #[test]
    fn test_config_validation_invalid_backend() {
        let mut config = Config::default();
        config.storage.backend = "postgres".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Config));
        assert!(err.to_string().contains("Must be one of: sqlite, memory"));

        config.storage.backend = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_values() {
        let mut config = Config::default();
        config.storage.max_messages = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.algorithm.window = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.path = Some(PathBuf::new());
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        clear_env();
        let config = Config::load("nonexistent.yaml", &cli_with(None, None, None)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml_is_config_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "storage: [not, a, map]").unwrap();

        let err = Config::load(path.to_str().unwrap(), &cli_with(None, None, None)).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Config));
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_file_values() {
        clear_env();
        std::env::set_var("MEMEX_STORAGE_BACKEND", "memory");
        std::env::set_var("MEMEX_DB_PATH", "/tmp/memex-env.db");
        std::env::set_var("MEMEX_MAX_MESSAGES", "25");
        std::env::set_var("MEMEX_WINDOW", "not-a-number");

        let mut config = Config::default();
        config.algorithm.window = Some(7);
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/memex-env.db")));
        assert_eq!(config.storage.max_messages, Some(25));
        assert_eq!(config.algorithm.window, Some(7));
    }

    #[test]
    #[serial]
    fn test_cli_overrides_win_over_env() {
        clear_env();
        std::env::set_var("MEMEX_MAX_MESSAGES", "25");

        let cli = cli_with(Some(PathBuf::from("/tmp/cli.db")), Some(9), Some(4));
        let config = Config::load("nonexistent.yaml", &cli).unwrap();
        clear_env();

        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/cli.db")));
        assert_eq!(config.storage.max_messages, Some(9));
        assert_eq!(config.algorithm.window, Some(4));
    }

    #[test]
    fn test_build_manager_memory_backend() {
        let mut config = Config::default();
        config.storage.backend = "memory".to_string();
        config.storage.max_messages = Some(3);
        config.algorithm.window = Some(2);

        let manager = config.build_manager().unwrap();
        assert_eq!(manager.storage().max_messages(), Some(3));
        assert!(manager.algorithm().is_some());
    }

    #[test]
    fn test_build_storage_sqlite_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("sub").join("memex.db"));

        let storage = config.build_storage().unwrap();
        assert!(storage.max_messages().is_none());
        assert!(dir.path().join("sub").join("memex.db").exists());
    }

    #[test]
    fn test_build_storage_unknown_backend() {
        let mut config = Config::default();
        config.storage.backend = "redis".to_string();
        let err = config.build_storage().err().unwrap();
        assert_eq!(kind_of(&err), Some(ErrorKind::Config));
    }

    #[test]
    fn test_build_algorithm_absent_without_window() {
        assert!(Config::default().build_algorithm().unwrap().is_none());
    }
}
