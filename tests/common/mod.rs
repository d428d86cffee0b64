//! Shared utilities for relay integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use mysql_relay::config::RelayConfig;
use mysql_relay::lifecycle::{self, Shutdown};
use mysql_relay::net::ConnectionTracker;
use mysql_relay::protocol::{Capabilities, PacketHeader};
use mysql_relay::RelayServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A v10 Initial Handshake frame as a MySQL 8 server would send it.
pub fn handshake_frame(protocol_version: u8) -> Vec<u8> {
    let caps = Capabilities::LONG_PASSWORD
        | Capabilities::PROTOCOL_41
        | Capabilities::TRANSACTIONS
        | Capabilities::SECURE_CONNECTION
        | Capabilities::PLUGIN_AUTH
        | Capabilities::DEPRECATE_EOF;

    let mut payload = vec![protocol_version];
    payload.extend_from_slice(b"8.0.36\0");
    payload.extend_from_slice(&1234u32.to_le_bytes());
    payload.extend_from_slice(b"\x1a\x2b\x3c\x4d\x5e\x6f\x70\x01");
    payload.push(0);
    payload.extend_from_slice(&caps.low_half().to_le_bytes());
    payload.push(0xff);
    payload.extend_from_slice(&0x0002u16.to_le_bytes());
    payload.extend_from_slice(&caps.high_half().to_le_bytes());
    payload.push(21);
    payload.extend_from_slice(&[0; 10]);
    payload.extend_from_slice(b"\x11\x22\x33\x44\x55\x66\x77\x08\x09\x0a\x0b\x0c\0");
    payload.extend_from_slice(b"caching_sha2_password\0");

    let mut frame = PacketHeader {
        length: payload.len() as u32,
        sequence_id: 0,
    }
    .encode()
    .to_vec();
    frame.extend_from_slice(&payload);
    frame
}

/// Start a mock MySQL server that sends `greeting` in small fragments and
/// then echoes everything it receives.
pub async fn start_mock_server(greeting: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let greeting = greeting.clone();
                    tokio::spawn(async move {
                        for chunk in greeting.chunks(7) {
                            if socket.write_all(chunk).await.is_err() {
                                return;
                            }
                            tokio::time::sleep(Duration::from_millis(2)).await;
                        }

                        let mut buf = [0u8; 1024];
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A free local address with nothing listening on it.
#[allow(dead_code)]
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tracker: ConnectionTracker,
    #[allow(dead_code)]
    pub config_updates: mpsc::UnboundedSender<RelayConfig>,
    pub task: JoinHandle<()>,
}

/// Start a relay on an ephemeral port in front of `upstream`.
pub async fn start_relay(upstream: SocketAddr, inspect: bool) -> RunningRelay {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.address = upstream.to_string();
    config.inspection.enabled = inspect;
    config.timeouts.connect_secs = 2;
    config.timeouts.handshake_secs = 2;

    let listener = lifecycle::start(&config).await.unwrap();
    let addr = listener.local_addr();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = RelayServer::new(config);
    let tracker = server.tracker();
    let task = tokio::spawn(server.run(listener, updates_rx, shutdown.subscribe()));

    RunningRelay {
        addr,
        shutdown,
        tracker,
        config_updates,
        task,
    }
}
