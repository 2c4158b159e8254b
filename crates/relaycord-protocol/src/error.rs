//! Error types for the protocol layer.
//!
//! The `Display` text of each variant is exactly what the sender sees in
//! the `Error` reply, so keep it short and client-facing.

use crate::MessageType;

/// A message that is malformed or structurally invalid for its type.
///
/// Protocol errors are terminal only to the offending message: the
/// connection is told via an `Error` reply and stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound message failed.
    #[cfg(feature = "json")]
    #[error("Failed to serialize message")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a `{type, args}` JSON document.
    #[cfg(feature = "json")]
    #[error("Failed to deserialize message")]
    Decode(#[source] serde_json::Error),

    /// A binary frame arrived; only text frames are parsed.
    #[error("Only text messages are allowed")]
    NonText,

    /// The `type` value is unknown, or is a server-to-client type.
    #[error("Specified type not supported")]
    UnsupportedType(i64),

    /// Fewer arguments than the message type requires.
    #[error("Missing required arguments")]
    MissingArguments {
        kind: MessageType,
        expected: usize,
        got: usize,
    },

    /// More arguments than the message type accepts.
    #[error("Too many arguments")]
    TooManyArguments {
        kind: MessageType,
        expected: usize,
        got: usize,
    },

    /// A `Join` argument that is not an `a.b.c.d:port` address.
    #[error("Invalid IP:Port specified")]
    InvalidAddress(String),
}
