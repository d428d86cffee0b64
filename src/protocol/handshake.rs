//! Initial Handshake packet (protocol version 10).
//!
//! ```text
//! 1              [0a] protocol version
//! string[NUL]    server version
//! 4              connection id
//! string[8]      auth-plugin-data-part-1
//! 1              [00] filler
//! 2              capability flags (lower 2 bytes)
//! 1              character set
//! 2              status flags
//! 2              capability flags (upper 2 bytes)
//! 1              length of auth-plugin-data (if PLUGIN_AUTH)
//! string[10]     reserved (all [00])
//! string[$len]   auth-plugin-data-part-2 (if SECURE_CONNECTION), $len = MAX(13, length of auth-plugin-data - 8)
//! string[NUL]    auth-plugin-name
//! ```
//!
//! <https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeV10>

use std::borrow::Cow;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::protocol::capabilities::Capabilities;
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::packet::PacketHeader;

/// The only protocol version the relay understands.
pub const PROTOCOL_VERSION: u8 = 0x0a;

const AUTH_PLUGIN_DATA_PART1_LEN: usize = 8;
const AUTH_PLUGIN_DATA_PART2_MIN_LEN: usize = 13;
const RESERVED_LEN: usize = 10;

/// The server's first message, as a structured record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    pub server_version: Bytes,
    pub connection_id: u32,
    /// Full auth seed: part 1 (8 bytes) followed by part 2, if any.
    pub auth_plugin_data: Bytes,
    pub capabilities: Capabilities,
    pub character_set: u8,
    pub status_flags: u16,
    /// Zero unless PLUGIN_AUTH is advertised.
    pub auth_plugin_data_len: u8,
    pub auth_plugin_name: Bytes,
}

/// A handshake together with the header it was decoded from.
///
/// Only [`HandshakePacket::decode`] produces this type, so encoding it always
/// reuses the sequence id the server sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    pub header: PacketHeader,
    pub handshake: InitialHandshake,
}

impl HandshakePacket {
    /// Decode a complete packet, header included.
    ///
    /// `buf` must hold at least `4 + length` bytes; anything after the frame
    /// is ignored.
    pub fn decode(buf: &[u8]) -> ProtocolResult<Self> {
        let header = PacketHeader::decode(buf)?;
        let available = buf.len() - PacketHeader::SIZE;
        let length = header.length as usize;

        if available < length {
            return Err(ProtocolError::Truncated {
                field: "payload",
                needed: length,
                remaining: available,
            });
        }

        let payload = &buf[PacketHeader::SIZE..PacketHeader::SIZE + length];
        let handshake = InitialHandshake::decode(Bytes::copy_from_slice(payload))?;

        Ok(Self { header, handshake })
    }

    /// Encode back to wire bytes with the original sequence id.
    pub fn encode(&self) -> ProtocolResult<Bytes> {
        self.handshake.encode(self.header.sequence_id)
    }
}

impl InitialHandshake {
    /// Decode the payload of an Initial Handshake packet (header excluded).
    pub fn decode(mut buf: Bytes) -> ProtocolResult<Self> {
        ensure(&buf, 1, "protocol version")?;
        let protocol_version = buf.get_u8();
        if protocol_version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedProtocolVersion(protocol_version));
        }

        let server_version = match memchr::memchr(0, &buf) {
            Some(nul) => {
                let version = buf.split_to(nul);
                buf.advance(1);
                version
            }
            None => {
                return Err(ProtocolError::MalformedPacket(
                    "server version is not NUL-terminated".into(),
                ))
            }
        };

        ensure(&buf, 4, "connection id")?;
        let connection_id = buf.get_u32_le();

        ensure(&buf, AUTH_PLUGIN_DATA_PART1_LEN, "auth plugin data part 1")?;
        let mut auth_plugin_data = BytesMut::from(&buf.split_to(AUTH_PLUGIN_DATA_PART1_LEN)[..]);

        ensure(&buf, 1, "filler")?;
        let filler = buf.get_u8();
        if filler != 0 {
            return Err(ProtocolError::MalformedPacket(format!(
                "expected filler 0x00, got 0x{filler:02x}"
            )));
        }

        ensure(&buf, 2, "capability flags (lower)")?;
        let capabilities_low = buf.get_u16_le();

        ensure(&buf, 1, "character set")?;
        let character_set = buf.get_u8();

        ensure(&buf, 2, "status flags")?;
        let status_flags = buf.get_u16_le();

        ensure(&buf, 2, "capability flags (upper)")?;
        let capabilities_high = buf.get_u16_le();

        let capabilities = Capabilities::from_halves(capabilities_low, capabilities_high);

        // the length slot is consumed even when PLUGIN_AUTH is clear
        ensure(&buf, 1 + RESERVED_LEN, "auth plugin data length and reserved")?;
        let mut auth_plugin_data_len = 0;
        if capabilities.has(Capabilities::PLUGIN_AUTH) {
            auth_plugin_data_len = buf[0];
            if auth_plugin_data_len == 0 {
                return Err(ProtocolError::InvalidAuthPluginLength);
            }
        }
        buf.advance(1 + RESERVED_LEN);

        if capabilities.has(Capabilities::SECURE_CONNECTION) {
            let extra = AUTH_PLUGIN_DATA_PART2_MIN_LEN
                .max((auth_plugin_data_len as usize).saturating_sub(AUTH_PLUGIN_DATA_PART1_LEN));

            ensure(&buf, extra, "auth plugin data part 2")?;
            auth_plugin_data.put(buf.split_to(extra));
        }

        // Bug#59453: servers before 5.5.10 and 5.6.2 omit the terminating NUL,
        // in which case the name runs to the end of the payload
        let auth_plugin_name = match memchr::memchr(0, &buf) {
            Some(nul) => buf.split_to(nul),
            None => buf,
        };

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            auth_plugin_data: auth_plugin_data.freeze(),
            capabilities,
            character_set,
            status_flags,
            auth_plugin_data_len,
            auth_plugin_name,
        })
    }

    /// Serialize header and payload, using `sequence_id` for the header.
    ///
    /// The auth plugin name is always written with a trailing NUL, even if
    /// it was decoded without one.
    pub fn encode(&self, sequence_id: u8) -> ProtocolResult<Bytes> {
        if self.auth_plugin_data.len() < AUTH_PLUGIN_DATA_PART1_LEN {
            return Err(ProtocolError::MalformedPacket(format!(
                "auth plugin data must hold at least {} bytes, got {}",
                AUTH_PLUGIN_DATA_PART1_LEN,
                self.auth_plugin_data.len()
            )));
        }

        let (part1, part2) = self.auth_plugin_data.split_at(AUTH_PLUGIN_DATA_PART1_LEN);

        let body_len = 1
            + self.server_version.len()
            + 1
            + 4
            + AUTH_PLUGIN_DATA_PART1_LEN
            + 1
            + 2
            + 1
            + 2
            + 2
            + 1
            + RESERVED_LEN
            + part2.len()
            + self.auth_plugin_name.len()
            + 1;

        let header = PacketHeader::for_payload(body_len, sequence_id)?;

        let mut buf = BytesMut::with_capacity(header.frame_len());
        header.put(&mut buf);

        buf.put_u8(self.protocol_version);
        buf.put_slice(&self.server_version);
        buf.put_u8(0);
        buf.put_u32_le(self.connection_id);
        buf.put_slice(part1);
        buf.put_u8(0);
        buf.put_u16_le(self.capabilities.low_half());
        buf.put_u8(self.character_set);
        buf.put_u16_le(self.status_flags);
        buf.put_u16_le(self.capabilities.high_half());
        buf.put_u8(self.auth_plugin_data_len);
        buf.put_bytes(0, RESERVED_LEN);
        buf.put_slice(part2);
        buf.put_slice(&self.auth_plugin_name);
        buf.put_u8(0);

        debug_assert_eq!(buf.len(), header.frame_len());

        Ok(buf.freeze())
    }

    pub fn server_version_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.server_version)
    }

    pub fn auth_plugin_name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.auth_plugin_name)
    }
}

fn ensure(buf: &Bytes, needed: usize, field: &'static str) -> ProtocolResult<()> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            field,
            needed,
            remaining: buf.remaining(),
        });
    }

    Ok(())
}
