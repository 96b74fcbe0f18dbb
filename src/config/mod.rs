//! Configuration management for pypi-index
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Distribution file storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Index behaviour
    #[serde(default)]
    pub index: IndexConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables with prefix PYPI_INDEX_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("PYPI_INDEX_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PYPI_INDEX_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(path) = std::env::var("PYPI_INDEX_DATABASE_PATH") {
            config.database.path = path;
        }

        if let Ok(path) = std::env::var("PYPI_INDEX_STORAGE_PATH") {
            config.storage.base_path = path;
        }
        if let Ok(size) = std::env::var("PYPI_INDEX_MAX_UPLOAD_MB") {
            config.storage.max_upload_mb = size
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid upload size".to_string()))?;
        }

        if let Ok(overwrite) = std::env::var("PYPI_INDEX_ALLOW_VERSION_OVERWRITE") {
            config.index.allow_version_overwrite = overwrite.parse().unwrap_or(false);
        }
        if let Ok(open) = std::env::var("PYPI_INDEX_REGISTRATION_OPEN") {
            config.index.registration_open = open.parse().unwrap_or(true);
        }

        if let Ok(level) = std::env::var("PYPI_INDEX_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("PYPI_INDEX_LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_upload_mb == 0 {
            return Err(ConfigError::InvalidValue(
                "storage.max_upload_mb must be greater than zero".to_string(),
            ));
        }
        if self.storage.base_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("storage.base_path".to_string()));
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ConfigError::InvalidValue(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                other
            ))),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: AuthRateLimitConfig,
}

/// Rate limiting configuration for authentication failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRateLimitConfig {
    /// Maximum number of failed attempts before blocking
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Duration to block after max failures (in seconds)
    #[serde(default = "default_block_duration")]
    pub block_duration_secs: u64,

    /// Window in which failures are counted (in seconds)
    #[serde(default = "default_window_duration")]
    pub window_duration_secs: u64,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            block_duration_secs: default_block_duration(),
            window_duration_secs: default_window_duration(),
        }
    }
}

fn default_max_failures() -> u32 {
    10
}

fn default_block_duration() -> u64 {
    300
}

fn default_window_duration() -> u64 {
    600
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/pypi-index.db".to_string()
}

/// Distribution file storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Directory uploaded distributions are written to
    #[serde(default = "default_storage_path")]
    pub base_path: String,

    /// Largest accepted request body in MiB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl StorageConfig {
    /// Body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_storage_path() -> String {
    "/data/dist".to_string()
}

fn default_max_upload_mb() -> u64 {
    100
}

/// Index behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Whether an existing release file may be replaced by a new upload
    #[serde(default)]
    pub allow_version_overwrite: bool,

    /// Whether the `user` action may create accounts
    #[serde(default = "default_registration_open")]
    pub registration_open: bool,

    /// Title of the index page
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            allow_version_overwrite: false,
            registration_open: default_registration_open(),
            title: default_title(),
        }
    }
}

fn default_registration_open() -> bool {
    true
}

fn default_title() -> String {
    "Package Index".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
