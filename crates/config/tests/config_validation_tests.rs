//! Configuration parsing and validation tests

use std::io::Write;

use tally_config::{ConfigError, ConfigLoader, ServerConfig};

#[test]
fn default_config_is_valid() {
    let config = ServerConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn invalid_bind_address_is_rejected() {
    let mut config = ServerConfig::default();
    config.network.bind_address = "not-an-address".to_string();

    match config.validate() {
        Err(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "network.bind_address");
        }
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

#[test]
fn batch_cap_cannot_exceed_burst_capacity() {
    let mut config = ServerConfig::default();
    config.rate_limit.burst_capacity = 10;
    config.rate_limit.max_batch = 11;

    assert!(config.validate().is_err());
}

#[test]
fn broadcast_interval_cannot_exceed_persist_interval() {
    let mut config = ServerConfig::default();
    config.flush.persist_interval_ms = 100;
    config.flush.broadcast_interval_ms = 200;

    assert!(config.validate().is_err());
}

#[test]
fn zero_refill_rate_is_rejected() {
    let mut config = ServerConfig::default();
    config.rate_limit.refill_rate = 0;

    assert!(config.validate().is_err());
}

#[test]
fn partial_toml_file_fills_in_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally-server.toml");

    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
[network]
bind_address = "127.0.0.1:9999"

[rate_limit]
burst_capacity = 20
max_batch = 20
"#
    )
    .unwrap();

    let config = ConfigLoader::from_file(&path).unwrap();
    assert_eq!(config.network.bind_address, "127.0.0.1:9999");
    assert_eq!(config.rate_limit.burst_capacity, 20);
    // Untouched sections keep their defaults.
    assert_eq!(config.rate_limit.refill_rate, 40);
    assert_eq!(config.flush.broadcast_interval_ms, 500);
    assert_eq!(config.storage.path, "tally.db");
}

#[test]
fn missing_file_reports_not_found() {
    let result = ConfigLoader::from_file("/definitely/not/here.toml");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn env_overrides_apply() {
    // Only logging vars here: the other tests in this binary run in parallel
    // and load configs of their own, but none of them assert on logging.
    std::env::set_var("TALLY_LOG_LEVEL", "debug");
    std::env::set_var("TALLY_LOG_FORMAT", "json");

    let config = ConfigLoader::from_env().unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");

    std::env::remove_var("TALLY_LOG_LEVEL");
    std::env::remove_var("TALLY_LOG_FORMAT");
}
