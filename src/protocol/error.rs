//! Protocol decode errors.

use thiserror::Error;

/// Errors produced while framing or decoding a wire packet.
///
/// All of these are terminal for the connection that produced them; the
/// offending bytes are never forwarded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than 4 bytes were available for the packet header.
    #[error("Truncated packet header: expected 4 bytes, got {0}")]
    TruncatedHeader(usize),

    /// A field ran past the end of the payload.
    #[error("Truncated packet while reading {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// Only protocol version 10 is understood.
    #[error("Unsupported protocol version {0}, only version 10 is supported")]
    UnsupportedProtocolVersion(u8),

    /// The packet structure is inconsistent (bad filler, missing terminator).
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// PLUGIN_AUTH is advertised but the auth plugin data length is zero.
    #[error("Invalid auth plugin data length 0 with PLUGIN_AUTH set")]
    InvalidAuthPluginLength,

    /// The payload does not fit in a single 24-bit length frame.
    #[error("Packet payload of {0} bytes exceeds the 16MiB frame limit")]
    PacketTooLarge(usize),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
