//! Logging setup for pypi-index
//!
//! Installs a global `tracing` subscriber writing JSON lines (the default) or
//! human-readable output.

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Logging initialization errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize subscriber: {0}")]
    Init(String),

    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Map a configured level name to a tracing level
///
/// Unknown names fall back to `info`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = LevelFilter::from_level(parse_level(&config.level));
    let format: LogFormat = config.format.parse()?;

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}
