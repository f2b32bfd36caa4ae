//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::notifier::DEFAULT_QUEUE_CAPACITY;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// User store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Keep everything in memory (nothing survives a restart)
    #[serde(default)]
    pub in_memory: bool,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("roster").join("users.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./roster_data/users.db".to_string())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            in_memory: false,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Change notifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Events buffered per watcher before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("roster").join("config.toml")),
            Some(PathBuf::from("/etc/roster/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Database overrides
        if let Some(path) = var("ROSTER_DB_PATH") {
            self.database.path = path;
        }
        if let Some(in_memory) = var("ROSTER_DB_IN_MEMORY") {
            self.database.in_memory = in_memory.to_lowercase() == "true" || in_memory == "1";
        }

        // API overrides
        if let Some(host) = var("ROSTER_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("ROSTER_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Notifier overrides
        if let Some(capacity) = var("ROSTER_QUEUE_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.notifier.queue_capacity = c;
            }
        }

        // Logging overrides
        if let Some(level) = var("ROSTER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("ROSTER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Roster Configuration
#
# Environment variables override these settings:
# - ROSTER_DB_PATH
# - ROSTER_DB_IN_MEMORY
# - ROSTER_API_HOST
# - ROSTER_API_PORT
# - ROSTER_QUEUE_CAPACITY
# - ROSTER_LOG_LEVEL
# - ROSTER_LOG_FORMAT

[database]
# SQLite file holding user records (default: platform data dir)
# path = "/var/lib/roster/users.db"

# Keep records in memory only
in_memory = false

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Allowed CORS origins (empty = allow any)
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 15

[notifier]
# Change events buffered per watcher; further events are dropped
# until the watcher catches up
queue_capacity = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.addr(), "0.0.0.0:8080");
        assert_eq!(config.notifier.queue_capacity, 10);
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.database.in_memory);
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.request_timeout_secs, 15);
        assert_eq!(config.notifier.queue_capacity, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[notifier]\nqueue_capacity = 64\n").unwrap();
        assert_eq!(config.notifier.queue_capacity, 64);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::parse("[api]\nport = \"not a number\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nport = 9000\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.port, 9000);

        let missing = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ROSTER_API_PORT", "9090"),
            ("ROSTER_QUEUE_CAPACITY", "32"),
            ("ROSTER_DB_IN_MEMORY", "true"),
            ("ROSTER_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.port, 9090);
        assert_eq!(config.notifier.queue_capacity, 32);
        assert!(config.database.in_memory);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "ROSTER_API_PORT" => Some("eighty".to_string()),
            _ => None,
        });
        assert_eq!(config.api.port, 8080);
    }
}
