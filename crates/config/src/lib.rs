//! Tally configuration management
//!
//! Provides configuration loading, parsing, and validation for the tally
//! counter server.

pub mod error;
pub mod loader;
pub mod server;

pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use server::{
    FlushConfig, LoggingConfig, NetworkConfig, RateLimitConfig, ServerConfig, StorageConfig,
};
