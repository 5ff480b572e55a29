//! Startup orchestration.
//!
//! Initializes subsystems in order and runs the relay until a shutdown
//! signal arrives. Any startup error is fatal.

use std::net::SocketAddr;

use crate::config::RelayConfig;
use crate::http::ProxyServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Errors that stop the relay from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server failed: {0}")]
    Server(#[from] std::io::Error),
}

/// Run the relay with `config` until SIGINT/SIGTERM.
pub async fn run(config: RelayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    tracing::info!(
        upstream_env = ?config.upstream.env_vars,
        fallback = %format!("{}:{}", config.upstream.fallback_host, config.upstream.fallback_port),
        executor = %config.executor.program,
        "Configuration loaded"
    );
    tracing::info!(
        "Point the client at the relay: export HTTP_PROXY=http://{local_addr} HTTPS_PROXY=http://{local_addr}"
    );

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(config);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::wait_for_shutdown_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Server task panicked"),
    }

    Ok(())
}
