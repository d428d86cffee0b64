//! MySQL Relay
//!
//! A transparent relay between MySQL clients and a MySQL server.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                    MYSQL RELAY                       │
//!                   │                                                      │
//!   MySQL Client    │  ┌──────────┐    ┌──────────┐    ┌───────────────┐  │
//!   ────────────────┼─▶│   net    │───▶│  relay   │───▶│   upstream    │──┼──▶ MySQL
//!                   │  │ listener │    │ session  │    │     dial      │  │    Server
//!                   │  └──────────┘    └────┬─────┘    └───────────────┘  │
//!                   │                       │                              │
//!                   │        inspection on  ▼                              │
//!                   │                ┌──────────────┐                      │
//!   ◀───────────────┼────────────────│   protocol   │◀─────────────────────┼─── first
//!     handshake     │                │ decode/encode│                      │    packet
//!                   │                └──────────────┘                      │
//!                   │                                                      │
//!                   │  then: copy_bidirectional for the rest of the session │
//!                   │                                                      │
//!                   │  config · lifecycle · observability · resilience     │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::sync::mpsc;

use mysql_relay::cli::Cli;
use mysql_relay::config::ConfigWatcher;
use mysql_relay::lifecycle::{self, Shutdown};
use mysql_relay::observability::logging::init_logging;
use mysql_relay::RelayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_logging(&config.observability)?;

    tracing::info!("mysql-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        inspection = config.inspection.enabled,
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    let listener = lifecycle::start(&config).await?;

    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, cli.overrides.clone());
            match watcher.run() {
                Ok(handle) => (updates, Some(handle)),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (updates, None)
                }
            }
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let shutdown = Shutdown::new();
    let server = RelayServer::new(config.clone());
    let tracker = server.tracker();
    let server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    lifecycle::wait_for_signal().await?;
    shutdown.trigger();
    server_task.await?;

    let drain_timeout = std::time::Duration::from_secs(config.shutdown.drain_timeout_secs);
    tracing::info!(
        active_connections = tracker.active_count(),
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "Waiting for in-flight relays to finish"
    );

    if !tracker.wait_for_drain(drain_timeout).await {
        tracing::warn!(
            active_connections = tracker.active_count(),
            "Drain timeout elapsed, exiting with relays still open"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
