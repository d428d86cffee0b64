//! Per-connection relay errors.

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Errors that abort a single relayed connection.
///
/// None of these stop the accept loop.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Could not open the upstream connection.
    #[error("Failed to connect to upstream {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// A setup step exceeded its deadline.
    #[error("Timed out after {secs}s while {operation}")]
    Timeout { operation: &'static str, secs: u64 },

    /// Reading or writing one of the two streams failed.
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The server's initial handshake could not be decoded.
    #[error("Handshake decode failed: {0}")]
    Protocol(#[from] ProtocolError),
}

impl RelayError {
    pub(crate) fn io(operation: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| RelayError::Io { operation, source }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Dial { .. } => "dial",
            RelayError::Timeout { .. } => "timeout",
            RelayError::Io { .. } => "io",
            RelayError::Protocol(_) => "protocol",
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
