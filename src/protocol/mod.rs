//! MySQL wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream server stream
//!     → packet.rs (read exactly 4 + length bytes)
//!     → packet.rs (PacketHeader: 3-byte LE length + sequence id)
//!     → handshake.rs (decode Initial Handshake v10)
//!     → capabilities.rs (32-bit flag set, split across two halves)
//!     → handshake.rs (encode back to bytes, original sequence id)
//!     → Client stream
//! ```
//!
//! # Design Decisions
//! - Only the server's first packet is ever interpreted
//! - Decoding is synchronous and operates on caller-owned buffers
//! - The decoded header travels with the record, so re-encoding always
//!   has a sequence id

pub mod capabilities;
pub mod error;
pub mod handshake;
pub mod packet;

pub use capabilities::Capabilities;
pub use error::{ProtocolError, ProtocolResult};
pub use handshake::{HandshakePacket, InitialHandshake, PROTOCOL_VERSION};
pub use packet::{read_packet, PacketHeader};
