//! Server configuration structures

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{ConfigError, Result};

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Network configuration
    pub network: NetworkConfig,
    /// Durable storage configuration
    pub storage: StorageConfig,
    /// Per-identity rate limiting
    pub rate_limit: RateLimitConfig,
    /// Persist / broadcast coalescing intervals
    pub flush: FlushConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server bind address and port
    pub bind_address: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file path
    pub path: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "tally.db".to_string(),
            max_connections: 4,
        }
    }
}

/// Rate limiting configuration
///
/// The abuse cutoff is derived, not configured: an identity whose cumulative
/// requested cost within one wall-clock second exceeds `1.5 * refill_rate` is
/// disconnected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Token bucket capacity (maximum burst)
    pub burst_capacity: u32,
    /// Tokens refilled per second
    pub refill_rate: u32,
    /// Largest increment a single message may request
    pub max_batch: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst_capacity: 40,
            refill_rate: 40,
            max_batch: 40,
        }
    }
}

/// Flush timer configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Delay between an admitted increment and the durable write, in milliseconds
    pub persist_interval_ms: u64,
    /// Delay between an admitted increment and the push to viewers, in milliseconds
    pub broadcast_interval_ms: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            persist_interval_ms: 30_000,
            broadcast_interval_ms: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.network
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "network.bind_address".to_string(),
                message: format!("Invalid socket address: {}", e),
            })?;

        if self.storage.path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.path".to_string(),
                message: "Database path cannot be empty".to_string(),
            });
        }

        if self.storage.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "storage.max_connections".to_string(),
                message: "Pool size must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.burst_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.burst_capacity".to_string(),
                message: "Burst capacity must be greater than 0".to_string(),
            });
        }

        if self.rate_limit.refill_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.refill_rate".to_string(),
                message: "Refill rate must be greater than 0".to_string(),
            });
        }

        // One message must never be able to drain more than the whole bucket.
        if self.rate_limit.max_batch == 0
            || self.rate_limit.max_batch > u64::from(self.rate_limit.burst_capacity)
        {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit.max_batch".to_string(),
                message: format!(
                    "Batch cap must be between 1 and the burst capacity ({})",
                    self.rate_limit.burst_capacity
                ),
            });
        }

        if self.flush.persist_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "flush.persist_interval_ms".to_string(),
                message: "Persist interval must be greater than 0".to_string(),
            });
        }

        if self.flush.broadcast_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "flush.broadcast_interval_ms".to_string(),
                message: "Broadcast interval must be greater than 0".to_string(),
            });
        }

        // Broadcast staleness is a UX concern, persistence staleness a
        // durability concern; the broadcast timer must be the faster one.
        if self.flush.broadcast_interval_ms > self.flush.persist_interval_ms {
            return Err(ConfigError::InvalidValue {
                field: "flush.broadcast_interval_ms".to_string(),
                message: "Broadcast interval cannot exceed the persist interval".to_string(),
            });
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    message: format!("Invalid log level: {}", other),
                });
            }
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "logging.format".to_string(),
                    message: format!("Unknown log format: {}", other),
                });
            }
        }

        Ok(())
    }

    /// Parsed bind address
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.network
            .bind_address
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                field: "network.bind_address".to_string(),
                message: format!("Invalid socket address: {}", e),
            })
    }
}
