//! Shutdown coordination.
//!
//! `main` owns the [`Shutdown`]; the accept loop waits on a
//! [`ShutdownSignal`]. Relay tasks never subscribe, so triggering stops new
//! connections and leaves established sessions to finish on their own.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Sending side of the shutdown signal.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A signal for one task that should stop when shutdown is triggered.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Tell every subscribed task to stop.
    pub fn trigger(&self) {
        match self.tx.send(()) {
            Ok(listeners) => tracing::debug!(listeners, "Shutdown signalled"),
            Err(_) => tracing::debug!("Shutdown signalled with nothing listening"),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
}

impl ShutdownSignal {
    /// Wait until shutdown is triggered.
    ///
    /// Also returns once the owning [`Shutdown`] is dropped, so a task can
    /// never outlive the coordinator that was meant to stop it.
    pub async fn recv(&mut self) {
        match self.rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => tracing::debug!("Shutdown coordinator dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut accept_loop = shutdown.subscribe();
        let mut watcher = shutdown.subscribe();

        shutdown.trigger();
        accept_loop.recv().await;
        watcher.recv().await;
    }

    #[tokio::test]
    async fn signal_waits_until_triggered() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();

        assert!(tokio::time::timeout(Duration::from_millis(50), signal.recv())
            .await
            .is_err());

        shutdown.trigger();
        assert!(tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn dropping_the_coordinator_releases_subscribers() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        drop(shutdown);

        assert!(tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .is_ok());
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        Shutdown::default().trigger();
    }
}
