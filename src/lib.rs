//! Transparent MySQL wire-protocol relay library.

pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod relay;
pub mod resilience;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use protocol::{Capabilities, HandshakePacket, InitialHandshake, PacketHeader, ProtocolError};
pub use relay::{RelayError, RelayServer};
