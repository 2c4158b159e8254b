//! Per-connection handler: authentication, the read loop, and dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Authenticate the upgrade credential → identity
//!   2. Admit a session into the registry
//!   3. Loop: receive frames → decode → dispatch each message to its own
//!      task, which routes it and replies `Ack` or `Error`
//!   4. On exit, tear down: deregister, release presence, close

use std::sync::Arc;

use relaycord_protocol::{ChatMessage, JsonCodec, ProtocolError, decode_frame};
use relaycord_session::{Authenticator, Session};
use relaycord_transport::Connection;

use crate::directory::Directory;
use crate::platform::ChatPlatform;
use crate::router::route;
use crate::server::ServerState;
use crate::RelayError;

/// Drop guard that tears the session down when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async part.
struct SessionGuard<C, A, D, P>
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    session: Arc<Session<C>>,
    state: Arc<ServerState<C, A, D, P>>,
}

impl<C, A, D, P> Drop for SessionGuard<C, A, D, P>
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    fn drop(&mut self) {
        let session = Arc::clone(&self.session);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            teardown(&state, &session).await;
        });
    }
}

/// Deregisters the session, releases its presence as an implicit
/// `Leave`, and closes the connection (bounded by the close timeout).
async fn teardown<C, A, D, P>(state: &ServerState<C, A, D, P>, session: &Session<C>)
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    session.terminate();
    state.registry.lock().await.evict(session);

    // Waits out a Join or Leave in flight; a Join that starts later sees
    // the session terminated and backs off.
    let transition = session.lock_transition().await;
    if let Some(server) = session.take_affiliation() {
        if let Err(e) = state.relay.notify_left(server, &session.account()).await {
            tracing::warn!(conn_id = %session.id(), error = %e, "presence release failed");
        }
    }
    drop(transition);
    session.close().await;
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A, D, P>(
    conn: C,
    state: Arc<ServerState<C, A, D, P>>,
) -> Result<(), RelayError>
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    let conn_id = conn.id();

    // --- Step 1: Authenticate ---
    let identity = match state.auth.authenticate(conn.credential().unwrap_or_default()).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "connection refused");
            let _ = tokio::time::timeout(state.session_config.close_timeout, conn.close()).await;
            return Err(RelayError::Unauthorized(e.to_string()));
        }
    };

    // --- Step 2: Admit ---
    // Admit and guard together: once the session is indexed, teardown is
    // guaranteed.
    let session = state.registry.lock().await.admit(identity, conn);
    let _guard = SessionGuard {
        session: Arc::clone(&session),
        state: Arc::clone(&state),
    };

    // --- Step 3: Read loop ---
    loop {
        let received = tokio::select! {
            received = session.connection().recv() => received,
            () = session.cancelled() => {
                tracing::info!(%conn_id, "session terminated");
                break;
            }
        };

        let frame = match received {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        dispatch(&state, &session, decode_frame(&JsonCodec, frame));
    }

    // _guard drops here → teardown fires.
    Ok(())
}

/// Handles one decoded message on its own task so a slow handler never
/// stalls the read loop.
///
/// The handler runs on a nested task; a panic there is caught by its
/// `JoinHandle` and answered with a generic `Error` instead of taking the
/// connection down.
fn dispatch<C, A, D, P>(
    state: &Arc<ServerState<C, A, D, P>>,
    session: &Arc<Session<C>>,
    decoded: Result<ChatMessage, ProtocolError>,
) where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    let state = Arc::clone(state);
    let session = Arc::clone(session);

    tokio::spawn(async move {
        let conn_id = session.id();
        let work = {
            let state = Arc::clone(&state);
            let session = Arc::clone(&session);
            tokio::spawn(async move { route(&state, &session, decoded?).await })
        };

        let outcome = match work.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                tracing::error!(%conn_id, "message handler panicked");
                Err(RelayError::Internal("message handler panicked".into()))
            }
            // Cancelled: the runtime is shutting down.
            Err(_) => return,
        };

        let reply = match &outcome {
            Ok(()) => ChatMessage::ack(),
            Err(e) => {
                if e.is_client_error() {
                    tracing::debug!(%conn_id, error = %e, "message rejected");
                } else {
                    tracing::warn!(%conn_id, error = %e, "message handling failed");
                }
                ChatMessage::error(e.reply_text())
            }
        };
        if let Err(e) = session.send(&reply).await {
            tracing::debug!(%conn_id, error = %e, "reply not delivered");
        }
    });
}
