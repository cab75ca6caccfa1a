//! Tally server entry point
//!
//! Handles command-line arguments, configuration loading, logging setup, and
//! wiring the storage layer into the counter actor.

use std::process;

use clap::{Arg, Command};
use tracing::{error, info};

use tally_config::{ConfigLoader, ServerConfig};
use tally_persistence::{CounterRepository, Database, DatabaseConfig};
use tally_server_core::{init_logging, CounterActor, ServerCore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("tally-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Realtime shared counter server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("bind-address")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 0.0.0.0:8080)"),
        )
        .arg(
            Arg::new("db-path")
                .long("db")
                .value_name("FILE")
                .help("SQLite database path"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .get_matches();

    let config = match load_configuration(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Logging setup error: {}", e);
        process::exit(1);
    }

    info!("Starting tally server v{}", env!("CARGO_PKG_VERSION"));

    let database = Database::new(DatabaseConfig {
        path: config.storage.path.clone(),
        max_connections: config.storage.max_connections,
        ..DatabaseConfig::default()
    })
    .await?;
    database.migrate().await?;

    let repository = CounterRepository::new(database.pool().clone());
    let actor = CounterActor::new(repository, config.rate_limit, config.flush);

    let server = ServerCore::new(config, actor);
    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        process::exit(1);
    }

    database.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from file or environment, then apply CLI overrides.
fn load_configuration(matches: &clap::ArgMatches) -> tally_config::Result<ServerConfig> {
    let mut config = if let Some(path) = matches.get_one::<String>("config") {
        ConfigLoader::from_file(path)?
    } else {
        ConfigLoader::load()?
    };

    if let Some(bind) = matches.get_one::<String>("bind-address") {
        config.network.bind_address = bind.clone();
    }
    if let Some(db_path) = matches.get_one::<String>("db-path") {
        config.storage.path = db_path.clone();
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}
