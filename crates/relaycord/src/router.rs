//! Per-message state machine of a session.
//!
//! ```text
//!                 Join (valid address)
//!   Unaffiliated ───────────────────────→ Affiliated
//!        ↑                                     │
//!        └──────────── Leave / close ──────────┘
//! ```
//!
//! | message | Unaffiliated              | Affiliated                    |
//! |---------|---------------------------|-------------------------------|
//! | Join    | affiliate, announce, Ack  | "Leave current server first"  |
//! | Leave   | "Join a server first"     | leave presence, Ack           |
//! | Global  | "Join a server first"     | relay if proxy, Ack           |
//! | Local   | "Join a server first"     | relay to bound channels, Ack  |
//!
//! The router only decides and returns; the reply itself is sent by the
//! dispatcher in the connection handler.
//!
//! `Join`, `Leave`, displacement and teardown each hold the session's
//! transition lock from the affiliation change until presence matches
//! it, so a session closed mid-`Join` never leaves a presence entry
//! behind.

use std::sync::Arc;

use relaycord_protocol::{ChatMessage, ClientRequest, ServerAddress};
use relaycord_session::{Authenticator, Session, SessionError};
use relaycord_transport::Connection;

use crate::directory::Directory;
use crate::error::Precondition;
use crate::platform::ChatPlatform;
use crate::server::ServerState;
use crate::RelayError;

/// Error text sent to a session displaced by a newer one for the same
/// account and server.
pub const SESSION_REPLACED_TEXT: &str = "Session is no longer valid";

/// Validates and applies one decoded message.
pub(crate) async fn route<C, A, D, P>(
    state: &ServerState<C, A, D, P>,
    session: &Arc<Session<C>>,
    message: ChatMessage,
) -> Result<(), RelayError>
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    match message.into_request()? {
        ClientRequest::Join { address } => join(state, session, &address).await,
        ClientRequest::Leave => leave(state, session).await,
        ClientRequest::Global { line } => {
            let server = session.server().ok_or(Precondition::NotAffiliated)?;
            let delivered = state
                .relay
                .deliver_global(server, &session.account(), &line)
                .await?;
            if delivered == 0 {
                tracing::debug!(
                    conn_id = %session.id(),
                    %server,
                    "global line not relayed to any channel"
                );
            }
            Ok(())
        }
        ClientRequest::Local { text } => {
            let server = session.server().ok_or(Precondition::NotAffiliated)?;
            state
                .relay
                .deliver_local_from_game(server, session.identity(), &text)
                .await?;
            Ok(())
        }
    }
}

async fn join<C, A, D, P>(
    state: &ServerState<C, A, D, P>,
    session: &Arc<Session<C>>,
    address: &str,
) -> Result<(), RelayError>
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    let server: ServerAddress = address.parse()?;
    let _transition = session.lock_transition().await;
    if session.is_terminated() {
        return Err(SessionError::Cancelled.into());
    }
    if session.server().is_some() {
        return Err(Precondition::AlreadyAffiliated.into());
    }

    displace_duplicates(state, session, server).await;

    session
        .try_affiliate(server)
        .map_err(|_| Precondition::AlreadyAffiliated)?;

    let rollback = Rollback(Some(session.as_ref()));
    state.relay.notify_joined(server, session.identity()).await?;
    rollback.disarm();
    tracing::info!(
        conn_id = %session.id(),
        account = %session.account(),
        %server,
        "joined server"
    );
    Ok(())
}

/// Clears a fresh affiliation unless disarmed, so a presence update that
/// fails or panics never leaves the session affiliated.
struct Rollback<'a, C: Connection>(Option<&'a Session<C>>);

impl<C: Connection> Rollback<'_, C> {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl<C: Connection> Drop for Rollback<'_, C> {
    fn drop(&mut self) {
        if let Some(session) = self.0 {
            session.take_affiliation();
        }
    }
}

async fn leave<C, A, D, P>(
    state: &ServerState<C, A, D, P>,
    session: &Arc<Session<C>>,
) -> Result<(), RelayError>
where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    let _transition = session.lock_transition().await;
    let server = session
        .take_affiliation()
        .ok_or(Precondition::NotAffiliated)?;
    state.relay.notify_left(server, &session.account()).await?;
    tracing::info!(
        conn_id = %session.id(),
        account = %session.account(),
        %server,
        "left server"
    );
    Ok(())
}

/// Force-closes other sessions of the same account that are affiliated
/// with `server`, so one account never holds two presence entries for
/// one server.
///
/// Best-effort: the notice may not arrive and nothing is retried. The
/// displaced session's presence is released here rather than by its
/// teardown, so the new session's join always follows it.
async fn displace_duplicates<C, A, D, P>(
    state: &ServerState<C, A, D, P>,
    session: &Arc<Session<C>>,
    server: ServerAddress,
) where
    C: Connection,
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    let duplicates: Vec<Arc<Session<C>>> = state
        .registry
        .lock()
        .await
        .lookup(&session.account())
        .into_iter()
        .filter(|other| other.id() != session.id() && other.server() == Some(server))
        .collect();

    for other in duplicates {
        tracing::info!(
            conn_id = %other.id(),
            replaced_by = %session.id(),
            %server,
            "displacing duplicate session"
        );
        if let Err(e) = other.send_error(SESSION_REPLACED_TEXT).await {
            tracing::debug!(conn_id = %other.id(), error = %e, "displacement notice not delivered");
        }
        other.terminate();
        let _transition = other.lock_transition().await;
        if let Some(previous) = other.take_affiliation() {
            if let Err(e) = state.relay.notify_left(previous, &other.account()).await {
                tracing::warn!(conn_id = %other.id(), error = %e, "presence release failed");
            }
        }
    }
}
