//! Error types for the session layer.

use relaycord_protocol::ProtocolError;
use relaycord_transport::ConnectionId;

/// Errors that can occur while admitting a session or talking to it.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential was missing, invalid, expired, or unverified.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An outbound send did not complete within the send timeout.
    #[error("send to {0} timed out")]
    SendTimedOut(ConnectionId),

    /// The session's lifetime ended while a send was pending.
    #[error("session cancelled")]
    Cancelled,

    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// An outbound message could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
