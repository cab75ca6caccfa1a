//! Server lifecycle

use tokio::net::TcpListener;
use tracing::{error, info};

use tally_config::ServerConfig;

use crate::counter::CounterActor;
use crate::error::Result;
use crate::routes::build_router;

/// Owns the listening socket and the actor for one server instance.
pub struct ServerCore {
    config: ServerConfig,
    actor: CounterActor,
}

impl ServerCore {
    pub fn new(config: ServerConfig, actor: CounterActor) -> Self {
        Self { config, actor }
    }

    /// Bind, serve until a shutdown signal arrives, then flush the counter
    /// so a clean stop does not discard the last persist interval.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_address()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", addr);

        let router = build_router(self.actor.clone());
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Err(err) = self.actor.flush_now().await {
            error!(error = %err, "final counter flush failed");
        }

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
