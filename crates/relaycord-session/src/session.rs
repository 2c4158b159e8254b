//! A single accepted chat socket connection.
//!
//! A session tracks:
//! - WHO is connected ([`Identity`])
//! - WHERE they are playing (the affiliated game-server address, if any)
//! - HOW long it lives (a cancellation token ended by eviction or close)
//!
//! Changes of affiliation and the presence updates that follow them are
//! serialized per session by [`Session::lock_transition`].
//!
//! Every outbound send is bounded by [`SessionConfig::send_timeout`] and
//! abandoned if the session's lifetime ends first, so no caller can block
//! on a stalled peer.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use relaycord_protocol::{
    AccountId, ChatMessage, Identity, JsonCodec, ServerAddress, encode_frame,
};
use relaycord_transport::{Connection, ConnectionId};
use tokio_util::sync::CancellationToken;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts applied to every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a single outbound send.
    ///
    /// Default: 10 seconds.
    pub send_timeout: Duration,

    /// Upper bound on the close handshake during teardown. Teardown
    /// proceeds once this elapses, whether or not the peer answered.
    ///
    /// Default: 5 seconds.
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One live chat socket connection and its relay state.
///
/// Owned by its connection task; the registry only holds an index entry
/// (an `Arc`) for fan-out and eviction.
pub struct Session<C: Connection> {
    connection: C,
    identity: Identity,
    /// Game server this session announced with `Join`, if any.
    affiliation: Mutex<Option<ServerAddress>>,
    /// Held across an affiliation change and its presence update.
    transition: tokio::sync::Mutex<()>,
    lifetime: CancellationToken,
    config: SessionConfig,
}

impl<C: Connection> Session<C> {
    /// Wraps an authenticated connection.
    pub fn new(identity: Identity, connection: C, config: SessionConfig) -> Self {
        Self {
            connection,
            identity,
            affiliation: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
            lifetime: CancellationToken::new(),
            config,
        }
    }

    /// The underlying connection's id.
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn account(&self) -> AccountId {
        self.identity.account
    }

    /// Display name carried by the session's credential.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    // -- Affiliation --------------------------------------------------------

    /// The game server this session is affiliated with.
    pub fn server(&self) -> Option<ServerAddress> {
        *self.affiliation()
    }

    /// Affiliates the session with `server` unless it already has one.
    ///
    /// # Errors
    /// Returns the current server when the session is already affiliated;
    /// the affiliation is left unchanged.
    pub fn try_affiliate(&self, server: ServerAddress) -> Result<(), ServerAddress> {
        let mut current = self.affiliation();
        match *current {
            Some(existing) => Err(existing),
            None => {
                *current = Some(server);
                Ok(())
            }
        }
    }

    /// Clears the affiliation, returning the server it pointed at.
    pub fn take_affiliation(&self) -> Option<ServerAddress> {
        self.affiliation().take()
    }

    /// Serializes join, leave, displacement and teardown of this session.
    ///
    /// Hold the guard from the affiliation change until presence reflects
    /// it. A holder that finds the session terminated must not affiliate
    /// it: teardown may already have released presence.
    pub async fn lock_transition(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.transition.lock().await
    }

    fn affiliation(&self) -> MutexGuard<'_, Option<ServerAddress>> {
        // The guarded value is a plain `Option`; a panic elsewhere cannot
        // leave it half-written.
        self.affiliation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Sending ------------------------------------------------------------

    /// Sends one message, bounded by the send timeout and the session's
    /// lifetime.
    ///
    /// # Errors
    /// - [`SessionError::SendTimedOut`] if the timeout elapsed first
    /// - [`SessionError::Cancelled`] if the session was terminated first
    /// - [`SessionError::Transport`] if the connection failed
    pub async fn send(&self, message: &ChatMessage) -> Result<(), SessionError> {
        let text = encode_frame(&JsonCodec, message)?;
        tokio::select! {
            result = self.connection.send_text(&text) => {
                result.map_err(|e| SessionError::Transport(e.to_string()))
            }
            () = tokio::time::sleep(self.config.send_timeout) => {
                Err(SessionError::SendTimedOut(self.id()))
            }
            () = self.lifetime.cancelled() => Err(SessionError::Cancelled),
        }
    }

    /// Replies with an `Error` message.
    pub async fn send_error(&self, reason: &str) -> Result<(), SessionError> {
        self.send(&ChatMessage::error(reason)).await
    }

    /// Replies with an `Ack` message.
    pub async fn send_ack(&self) -> Result<(), SessionError> {
        self.send(&ChatMessage::ack()).await
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Ends the session's lifetime. Pending sends are abandoned and the
    /// connection task stops reading.
    pub fn terminate(&self) {
        self.lifetime.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Resolves once [`terminate`](Self::terminate) has been called.
    pub async fn cancelled(&self) {
        self.lifetime.cancelled().await;
    }

    /// Closes the connection, giving up after the close timeout.
    ///
    /// Best-effort: failures are logged, never returned.
    pub async fn close(&self) {
        match tokio::time::timeout(self.config.close_timeout, self.connection.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id = %self.id(), error = %e, "close failed");
            }
            Err(_) => {
                tracing::debug!(conn_id = %self.id(), "close timed out");
            }
        }
    }
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("identity", &self.identity)
            .field("server", &self.server())
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
