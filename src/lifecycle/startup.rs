//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Bind the client-facing listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::RelayConfig;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Errors that stop the process before it accepts traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("Failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Bring up everything the relay needs and return the bound listener.
pub async fn start(config: &RelayConfig) -> Result<Listener, StartupError> {
    let observability = &config.observability;

    if observability.metrics_enabled {
        let addr: SocketAddr = observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    Ok(Listener::bind(&config.listener).await?)
}
