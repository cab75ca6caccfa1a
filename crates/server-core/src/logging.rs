//! Logging configuration and setup
//!
//! Structured logging via tracing, with the format and default level taken
//! from configuration. `RUST_LOG` still wins when set.

use tally_config::LoggingConfig;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::error::{Result, ServerError};

/// Initialize the global logging subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = parse_log_level(&config.level)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    match config.format.as_str() {
        "json" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| ServerError::Internal(format!("Failed to set logger: {}", e)))?;
        }
        "pretty" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .pretty()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| ServerError::Internal(format!("Failed to set logger: {}", e)))?;
        }
        "compact" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .compact()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| ServerError::Internal(format!("Failed to set logger: {}", e)))?;
        }
        other => {
            return Err(ServerError::Internal(format!("Unknown log format: {}", other)));
        }
    }

    tracing::info!("Logging initialized with level: {}", level);
    Ok(())
}

/// Parse log level string
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(ServerError::Internal(format!("Invalid log level: {}", other))),
    }
}
