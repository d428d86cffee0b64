//! Accept loop for the relay.
//!
//! # Responsibilities
//! - Accept client connections and spawn one task per relay
//! - Snapshot the active config for each new connection
//! - Apply reloaded configs to connections accepted afterwards
//! - Stop accepting on shutdown without touching in-flight relays

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::relay::session::{handle_connection, SessionSettings};

/// The relay server.
pub struct RelayServer {
    config: Arc<ArcSwap<RelayConfig>>,
    tracker: ConnectionTracker,
}

impl RelayServer {
    /// Create a new relay server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle to the active-connection tracker, for draining on shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run the accept loop until `shutdown` fires.
    ///
    /// The listener is dropped on return, which closes the listening socket.
    /// Relays already spawned keep running until their peers close.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: ShutdownSignal,
    ) {
        tracing::info!(address = %listener.local_addr(), "Relay server starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!(
                        active_connections = self.tracker.active_count(),
                        "Shutdown requested, closing listener"
                    );
                    break;
                }

                Some(new_config) = config_updates.recv() => {
                    self.apply_config(new_config);
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => self.spawn_session(stream, peer_addr, permit),
                    Err(e) => {
                        metrics::record_connection_error("accept");
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        drop(listener);
        tracing::info!("Relay server stopped accepting connections");
    }

    fn apply_config(&self, new_config: RelayConfig) {
        let current = self.config.load();

        if new_config.listener.bind_address != current.listener.bind_address {
            tracing::warn!(
                current = %current.listener.bind_address,
                requested = %new_config.listener.bind_address,
                "Listener address cannot change at runtime, ignoring"
            );
        }

        tracing::info!(
            upstream = %new_config.upstream.address,
            inspection = new_config.inspection.enabled,
            "Configuration reloaded"
        );

        self.config.store(Arc::new(new_config));
    }

    fn spawn_session(&self, stream: TcpStream, peer_addr: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let settings = SessionSettings::from_config(&self.config.load());
        metrics::record_connection_accepted();

        tracing::info!(
            connection_id = %guard.id(),
            peer_addr = %peer_addr,
            "Connection accepted"
        );

        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();
            let started = Instant::now();

            if let Err(e) = handle_connection(stream, peer_addr, connection_id, &settings).await {
                metrics::record_connection_error(e.kind());
                tracing::warn!(
                    connection_id = %connection_id,
                    peer_addr = %peer_addr,
                    error = %e,
                    "Connection aborted"
                );
            }

            metrics::record_session_duration(started);
            drop(guard);
        });
    }
}
