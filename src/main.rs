//! Local relay proxy.
//!
//! Sits between a client whose HTTP stack cannot authenticate to a proxy and
//! the authenticating upstream proxy it has to use.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                 RELAY PROXY                  │
//!   Client request   │  ┌──────────┐    ┌──────────┐                │
//!   ─────────────────┼─▶│   net    │───▶│  http    │                │
//!                    │  │ listener │    │ framing  │                │
//!                    │  └──────────┘    └────┬─────┘                │
//!                    │            CONNECT    │     other            │
//!                    │          ┌────────────┴──────────┐           │
//!                    │          ▼                       ▼           │
//!                    │   ┌────────────┐          ┌────────────┐     │
//!                    │   │   tunnel   │          │  forward   │     │
//!                    │   │ handshake  │          │  executor  │     │
//!                    │   │  + relay   │          │  process   │     │
//!                    │   └─────┬──────┘          └─────┬──────┘     │
//!                    └─────────┼───────────────────────┼────────────┘
//!                              ▼                       ▼
//!                       upstream proxy          curl --proxy ...
//! ```

use std::path::PathBuf;

use clap::Parser;

use relay_proxy::config::{self, RelayConfig};
use relay_proxy::lifecycle::startup;
use relay_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Local proxy that authenticates to an upstream proxy on the client's behalf", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "RELAY_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level when RUST_LOG is not set.
    #[arg(long)]
    log_level: Option<String>,

    /// Program used to execute plain HTTP requests.
    #[arg(long)]
    executor: Option<String>,

    /// Bound on concurrently handled connections.
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Cli {
    fn load_config(&self) -> Result<RelayConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => RelayConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(executor) = &self.executor {
            config.executor.program = executor.clone();
        }
        if self.max_connections.is_some() {
            config.listener.max_connections = self.max_connections;
        }

        config::validation::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        "relay-proxy starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
