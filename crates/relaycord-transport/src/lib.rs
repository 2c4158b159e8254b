//! Transport abstraction layer for Relaycord.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the session
//! and server layers are written against, plus the WebSocket chat socket
//! game clients connect to.
//!
//! A connection moves whole logical messages ([`Frame`]s). Physical
//! fragmentation is reassembled below this layer, so callers never see a
//! partial message.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{CHAT_SOCKET_PATH, PendingUpgrade, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One complete logical message received from a peer.
///
/// The chat protocol only speaks text; binary frames are surfaced so the
/// protocol layer can reject them explicitly instead of guessing at an
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text message.
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
}

/// Accepts new incoming connections.
///
/// Accepting is split in two: [`accept`](Self::accept) only takes the
/// next peer off the listener, while [`upgrade`](Self::upgrade) runs the
/// protocol handshake. Callers run the upgrade off the accept loop so a
/// peer that never finishes its handshake cannot hold up the next one.
pub trait Transport: Send + Sync + 'static {
    /// An accepted peer that has not completed its handshake.
    type Pending: Send + 'static;
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming peer.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Pending, Self::Error>> + Send;

    /// Completes the handshake of an accepted peer.
    fn upgrade(
        pending: Self::Pending,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive frames.
///
/// The futures are declared `Send` so generic handlers can run them on
/// spawned Tokio tasks.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends a text frame to the remote peer.
    ///
    /// Concurrent callers are serialized; frames are never interleaved.
    fn send_text(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next complete frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;

    /// Starts the close handshake.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The bearer credential the peer presented when it connected, if any.
    fn credential(&self) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    #[test]
    fn test_frame_equality_distinguishes_text_and_binary() {
        let text = Frame::Text("hi".into());
        let binary = Frame::Binary(b"hi".to_vec());
        assert_ne!(text, binary);
        assert_eq!(text, Frame::Text("hi".into()));
    }
}
