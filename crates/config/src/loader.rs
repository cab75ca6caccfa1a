//! Configuration loading and parsing

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, Result, ServerConfig};

/// Configuration loader with support for files and environment variables
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ServerConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Configuration file not found: {}", path.display()),
            )));
        }

        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;

        let mut config: ServerConfig = toml::from_str(&content).map_err(ConfigError::Toml)?;

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<ServerConfig> {
        let mut config = ServerConfig::default();
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with file fallback to environment
    pub fn load() -> Result<ServerConfig> {
        let config_paths = [
            "tally-server.toml",
            "config/tally-server.toml",
            "/etc/tally/server.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        if let Ok(config_file) = env::var("TALLY_CONFIG_FILE") {
            return Self::from_file(config_file);
        }

        Self::from_env()
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(config: &mut ServerConfig) -> Result<()> {
        if let Ok(bind_address) = env::var("TALLY_BIND_ADDRESS") {
            config.network.bind_address = bind_address;
        }

        if let Ok(db_path) = env::var("TALLY_DB_PATH") {
            config.storage.path = db_path;
        }

        if let Ok(burst) = env::var("TALLY_BURST_CAPACITY") {
            config.rate_limit.burst_capacity = burst
                .parse()
                .map_err(|e| ConfigError::Environment(format!("Invalid TALLY_BURST_CAPACITY: {}", e)))?;
        }

        if let Ok(rate) = env::var("TALLY_REFILL_RATE") {
            config.rate_limit.refill_rate = rate
                .parse()
                .map_err(|e| ConfigError::Environment(format!("Invalid TALLY_REFILL_RATE: {}", e)))?;
        }

        if let Ok(max_batch) = env::var("TALLY_MAX_BATCH") {
            config.rate_limit.max_batch = max_batch
                .parse()
                .map_err(|e| ConfigError::Environment(format!("Invalid TALLY_MAX_BATCH: {}", e)))?;
        }

        if let Ok(persist) = env::var("TALLY_PERSIST_INTERVAL_MS") {
            config.flush.persist_interval_ms = persist.parse().map_err(|e| {
                ConfigError::Environment(format!("Invalid TALLY_PERSIST_INTERVAL_MS: {}", e))
            })?;
        }

        if let Ok(broadcast) = env::var("TALLY_BROADCAST_INTERVAL_MS") {
            config.flush.broadcast_interval_ms = broadcast.parse().map_err(|e| {
                ConfigError::Environment(format!("Invalid TALLY_BROADCAST_INTERVAL_MS: {}", e))
            })?;
        }

        if let Ok(log_level) = env::var("TALLY_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Ok(log_format) = env::var("TALLY_LOG_FORMAT") {
            config.logging.format = log_format;
        }

        Ok(())
    }
}
