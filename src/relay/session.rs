//! A single relayed connection.
//!
//! # Responsibilities
//! - Dial the upstream server
//! - Optionally decode, log and re-encode the server's initial handshake
//! - Copy bytes in both directions until either side closes
//!
//! # Ordering
//! When inspecting, the re-encoded handshake is written and flushed to the
//! client before either copy direction starts, so the client never sees raw
//! upstream bytes ahead of it.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::RelayConfig;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::protocol::{read_packet, HandshakePacket};
use crate::relay::error::{RelayError, RelayResult};
use crate::resilience::timeouts::with_timeout;

/// Settings captured from the active config when a connection is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub upstream: String,
    pub inspect: bool,
    pub connect_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
}

impl SessionSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            upstream: config.upstream.address.clone(),
            inspect: config.inspection.enabled,
            connect_timeout_secs: config.timeouts.connect_secs,
            handshake_timeout_secs: config.timeouts.handshake_secs,
        }
    }
}

/// Bytes copied in each direction once the relay is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_server: u64,
    pub server_to_client: u64,
}

/// Relay one accepted client connection to completion.
pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    connection_id: ConnectionId,
    settings: &SessionSettings,
) -> RelayResult<RelayStats> {
    let started = Instant::now();
    let mut upstream = dial(settings).await?;

    tracing::debug!(
        connection_id = %connection_id,
        peer_addr = %peer_addr,
        upstream = %settings.upstream,
        inspect = settings.inspect,
        "Upstream connected"
    );

    if settings.inspect {
        with_timeout(
            settings.handshake_timeout_secs,
            "forwarding the initial handshake",
            forward_handshake(&mut upstream, &mut client, connection_id),
        )
        .await?;
    }

    let stats = relay(&mut client, &mut upstream).await?;

    tracing::info!(
        connection_id = %connection_id,
        peer_addr = %peer_addr,
        client_to_server = stats.client_to_server,
        server_to_client = stats.server_to_client,
        duration_ms = started.elapsed().as_millis() as u64,
        "Connection closed"
    );

    Ok(stats)
}

async fn dial(settings: &SessionSettings) -> RelayResult<TcpStream> {
    let connect = async {
        TcpStream::connect(&settings.upstream)
            .await
            .map_err(|source| RelayError::Dial {
                address: settings.upstream.clone(),
                source,
            })
    };

    let stream = with_timeout(settings.connect_timeout_secs, "connecting to upstream", connect).await?;

    // the handshake is small and latency-sensitive
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(
            upstream = %settings.upstream,
            error = %e,
            "Failed to set TCP_NODELAY on upstream socket"
        );
    }

    Ok(stream)
}

/// Read the server's first packet, decode it, log it and pass it on.
///
/// The packet is read with length-prefixed framing, so it may arrive over any
/// number of reads. Nothing is written to `client` unless decoding succeeds.
pub async fn forward_handshake<U, C>(
    upstream: &mut U,
    client: &mut C,
    connection_id: ConnectionId,
) -> RelayResult<HandshakePacket>
where
    U: AsyncRead + Unpin,
    C: AsyncWrite + Unpin,
{
    let raw = read_packet(upstream)
        .await
        .map_err(RelayError::io("reading the initial handshake"))?;

    let packet = match HandshakePacket::decode(&raw) {
        Ok(packet) => packet,
        Err(e) => {
            metrics::record_handshake("rejected");
            return Err(e.into());
        }
    };

    log_handshake(connection_id, &packet);

    let encoded = packet.encode()?;
    client
        .write_all(&encoded)
        .await
        .map_err(RelayError::io("writing the initial handshake"))?;
    client
        .flush()
        .await
        .map_err(RelayError::io("flushing the initial handshake"))?;

    metrics::record_handshake("forwarded");
    Ok(packet)
}

fn log_handshake(connection_id: ConnectionId, packet: &HandshakePacket) {
    let handshake = &packet.handshake;

    tracing::info!(
        connection_id = %connection_id,
        sequence_id = packet.header.sequence_id,
        protocol_version = handshake.protocol_version,
        server_version = %handshake.server_version_lossy(),
        server_connection_id = handshake.connection_id,
        character_set = handshake.character_set,
        status_flags = %format_args!("0x{:04x}", handshake.status_flags),
        capabilities = %format_args!("0x{:08x}", handshake.capabilities.bits()),
        auth_plugin = %handshake.auth_plugin_name_lossy(),
        "Initial handshake observed"
    );

    tracing::debug!(
        connection_id = %connection_id,
        "Server capabilities:\n{}",
        handshake.capabilities
    );
}

/// Copy bytes both ways until both directions have closed.
pub async fn relay<C, U>(client: &mut C, upstream: &mut U) -> RelayResult<RelayStats>
where
    C: AsyncRead + AsyncWrite + Unpin + ?Sized,
    U: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let (client_to_server, server_to_client) = tokio::io::copy_bidirectional(client, upstream)
        .await
        .map_err(RelayError::io("relaying"))?;

    metrics::record_bytes("client_to_server", client_to_server);
    metrics::record_bytes("server_to_client", server_to_client);

    Ok(RelayStats {
        client_to_server,
        server_to_client,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Capabilities, PacketHeader, ProtocolError};
    use tokio::io::{duplex, AsyncReadExt};

    fn handshake_frame(protocol_version: u8) -> Vec<u8> {
        let caps = Capabilities::PROTOCOL_41 | Capabilities::PLUGIN_AUTH | Capabilities::SECURE_CONNECTION;

        let mut payload = vec![protocol_version];
        payload.extend_from_slice(b"8.0.36\0");
        payload.extend_from_slice(&9u32.to_le_bytes());
        payload.extend_from_slice(b"abcdefgh");
        payload.push(0);
        payload.extend_from_slice(&caps.low_half().to_le_bytes());
        payload.push(0xff);
        payload.extend_from_slice(&0x0002u16.to_le_bytes());
        payload.extend_from_slice(&caps.high_half().to_le_bytes());
        payload.push(21);
        payload.extend_from_slice(&[0; 10]);
        payload.extend_from_slice(b"ijklmnopqrst\0");
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

    #[tokio::test]
    async fn forwards_identical_handshake_bytes() {
        let frame = handshake_frame(10);
        let mut upstream: &[u8] = &frame;
        let (mut client_side, mut relay_side) = duplex(1024);

        let packet = forward_handshake(&mut upstream, &mut relay_side, ConnectionId::new())
            .await
            .unwrap();
        assert_eq!(&packet.handshake.auth_plugin_name[..], b"caching_sha2_password");
        drop(relay_side);

        let mut received = Vec::new();
        client_side.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, frame);
    }

    #[tokio::test]
    async fn malformed_handshake_is_not_forwarded() {
        let frame = handshake_frame(9);
        let mut upstream: &[u8] = &frame;
        let (mut client_side, mut relay_side) = duplex(1024);

        let err = forward_handshake(&mut upstream, &mut relay_side, ConnectionId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::Protocol(ProtocolError::UnsupportedProtocolVersion(9))
        ));
        drop(relay_side);

        let mut received = Vec::new();
        client_side.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn truncated_handshake_is_an_io_error() {
        let frame = handshake_frame(10);
        let mut upstream: &[u8] = &frame[..20];
        let mut sink = Vec::new();

        let err = forward_handshake(&mut upstream, &mut sink, ConnectionId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "io");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn relay_copies_both_directions() {
        let (mut client, mut client_peer) = duplex(64);
        let (mut upstream, mut upstream_peer) = duplex(64);

        let relay_task = tokio::spawn(async move { relay(&mut client_peer, &mut upstream_peer).await });

        client.write_all(b"SELECT 1").await.unwrap();
        let mut buf = [0u8; 8];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"SELECT 1");

        upstream.write_all(b"row").await.unwrap();
        let mut buf = [0u8; 3];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"row");

        drop(client);
        drop(upstream);

        let stats = relay_task.await.unwrap().unwrap();
        assert_eq!(
            stats,
            RelayStats {
                client_to_server: 8,
                server_to_client: 3
            }
        );
    }

    #[test]
    fn settings_follow_config() {
        let mut config = RelayConfig::default();
        config.inspection.enabled = true;
        config.upstream.address = "db:3306".to_string();

        let settings = SessionSettings::from_config(&config);
        assert!(settings.inspect);
        assert_eq!(settings.upstream, "db:3306");
        assert_eq!(settings.connect_timeout_secs, 5);
    }
}
