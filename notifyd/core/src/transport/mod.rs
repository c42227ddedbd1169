//! IPC Transport
//!
//! Carries [`ServiceCall`](crate::service::ServiceCall)s from clients to the
//! daemon and [`ServiceReply`](crate::service::ServiceReply)s back, as
//! CRC-checked JSON frames over a Unix domain socket.
//!
//! Connection tasks only decode and encode; every call is forwarded to the
//! single loop that owns notification state.

pub mod frame;
pub mod unix_socket;

use std::fmt;

pub use unix_socket::{
    default_socket_path, ConnectionId, IncomingCall, ServiceClient, ServiceListener,
};

/// Errors that can occur during transport operations
#[derive(Debug)]
pub enum TransportError {
    /// IO error from the underlying socket
    Io(std::io::Error),
    /// Message serialization/deserialization error
    Serialization(String),
    /// A frame exceeded the size limit
    FrameTooLarge {
        /// Size claimed or produced
        size: usize,
        /// Allowed maximum
        max: usize,
    },
    /// Frame checksum mismatch - data corruption detected
    ChecksumMismatch {
        /// Expected checksum value
        expected: u32,
        /// Actual checksum value received
        actual: u32,
    },
    /// The peer is not allowed to connect
    AuthenticationFailed(String),
    /// The peer closed the connection
    ConnectionClosed,
    /// Transport not in expected state
    InvalidState(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::FrameTooLarge { size, max } => {
                write!(f, "Frame too large: {size} bytes (max: {max})")
            }
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "Checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
            ),
            Self::AuthenticationFailed(msg) => write!(f, "Authentication failed: {msg}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
