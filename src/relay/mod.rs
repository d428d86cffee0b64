//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! Listener accepts client
//!     → server.rs (connection id, config snapshot, spawn task)
//!     → session.rs (dial upstream within connect timeout)
//!     → session.rs (inspection enabled: read, decode, log, re-encode handshake)
//!     → session.rs (copy_bidirectional until both sides close)
//! ```
//!
//! # Design Decisions
//! - One task per connection; the two copy directions run concurrently
//! - Any failure aborts only its own connection and is logged
//! - Shutdown closes the listener only; relays drain naturally

pub mod error;
pub mod server;
pub mod session;

pub use error::{RelayError, RelayResult};
pub use server::RelayServer;
pub use session::{forward_handshake, handle_connection, relay, RelayStats, SessionSettings};
