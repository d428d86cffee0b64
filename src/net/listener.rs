//! Client-facing TCP listener.
//!
//! Every accepted client holds a [`ConnectionPermit`] for the life of its
//! relay. Once `listener.max_connections` permits are out, new clients wait
//! in the kernel backlog until a relay finishes.

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid listen address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        source: AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind { address: SocketAddr, source: io::Error },

    #[error("failed to accept client: {0}")]
    Accept(#[source] io::Error),

    #[error("connection limit is closed")]
    LimitClosed,
}

/// Listening socket with a cap on concurrent relays.
pub struct Listener {
    socket: TcpListener,
    local_addr: SocketAddr,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address: SocketAddr =
            config
                .bind_address
                .parse()
                .map_err(|source| ListenerError::InvalidAddress {
                    address: config.bind_address.clone(),
                    source,
                })?;

        let bind_error = |source| ListenerError::Bind { address, source };
        let socket = TcpListener::bind(address).await.map_err(bind_error)?;
        let local_addr = socket.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listening for MySQL clients"
        );

        Ok(Self {
            socket,
            local_addr,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Wait for a free slot, then for the next client.
    ///
    /// Cancel safe: dropping the future before a client arrives releases
    /// the slot again.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                tracing::warn!(
                    max_connections = self.max_connections,
                    "Connection limit reached, new clients wait for a relay to finish"
                );
                Arc::clone(&self.permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| ListenerError::LimitClosed)?
            }
            Err(TryAcquireError::Closed) => return Err(ListenerError::LimitClosed),
        };

        let (stream, peer_addr) = self.socket.accept().await.map_err(ListenerError::Accept)?;

        Ok((stream, peer_addr, ConnectionPermit { _permit: permit }))
    }

    /// Address actually bound, with the real port when `:0` was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// One relay slot. Dropping it lets the listener take another client.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
