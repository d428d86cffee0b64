//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! New client connection:
//!     → timeouts.rs (enforce connect timeout on the upstream dial)
//!     → timeouts.rs (enforce handshake timeout when inspecting)
//! ```
//!
//! # Design Decisions
//! - Every setup step has a deadline
//! - No retries: a failed dial or handshake aborts only that connection

pub mod timeouts;
