//! Errors surfaced by the connection manager.

use serde::Serialize;

use crate::state::ConnectionState;
use crate::transport::TransportError;

/// Everything that can end (or refuse to start) a chat session.
///
/// Cloneable so it can travel inside [`crate::event::Event`]s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ChatError {
    /// Bad port or empty nickname/host. Raised before any I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// `connect` called while a connection is live or being set up.
    #[error("a connection is already {0}")]
    Busy(ConnectionState),

    #[error("connection refused by {0}: server offline or wrong host/port")]
    ConnectionRefused(String),

    #[error("invalid host address: {0}")]
    AddressInvalid(String),

    #[error("handshake timed out: server did not answer in time")]
    HandshakeTimeout,

    /// The server's opening line was not `NICK`.
    #[error("unexpected server reply: '{0}'")]
    HandshakeFailed(String),

    #[error("nickname '{0}' is already in use")]
    NicknameTaken(String),

    #[error("transport error: {0}")]
    TransportError(String),

    /// Zero-length read: the server closed its side.
    #[error("connection closed by the server")]
    PeerClosed,
}

impl ChatError {
    /// Map a failed TCP connect to the handshake-phase taxonomy.
    pub(crate) fn from_connect(err: TransportError, addr: &str) -> Self {
        match err {
            TransportError::Refused => ChatError::ConnectionRefused(addr.to_string()),
            TransportError::AddressInvalid(detail) => ChatError::AddressInvalid(detail),
            TransportError::TimedOut => ChatError::HandshakeTimeout,
            TransportError::Closed => ChatError::TransportError("transport closed".to_string()),
            TransportError::Io(detail) => ChatError::TransportError(detail),
        }
    }

    /// Map a failed steady-state read or write.
    pub(crate) fn from_io(err: TransportError) -> Self {
        match err {
            TransportError::Io(detail) => ChatError::TransportError(detail),
            other => ChatError::TransportError(other.to_string()),
        }
    }
}
