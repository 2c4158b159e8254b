//! `RelayServer` builder, accept loop, and the inbound [`RelayHandle`].
//!
//! This is the entry point for running the relay. It ties together all
//! the layers: transport → protocol → session → presence → platform.

use std::sync::Arc;

use futures_util::future::join_all;
use relaycord_protocol::{AccountId, ChannelId, ChatMessage};
use relaycord_session::{Authenticator, SessionConfig, SessionRegistry};
use relaycord_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::directory::Directory;
use crate::handler::handle_connection;
use crate::platform::ChatPlatform;
use crate::relay::{Relay, Templates};
use crate::RelayError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry and the relay's presence map each have their own lock.
pub(crate) struct ServerState<C, A, D, P>
where
    C: Connection,
{
    pub(crate) registry: Mutex<SessionRegistry<C>>,
    pub(crate) relay: Relay<D, P>,
    pub(crate) auth: A,
    pub(crate) session_config: SessionConfig,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,ignore
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:8081")
///     .templates(config.templates.clone())
///     .build(signer, directory, discord)
///     .await?;
/// server.run().await
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    templates: Templates,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".to_string(),
            session_config: SessionConfig::default(),
            templates: Templates::default(),
        }
    }

    /// Sets the address the chat socket binds to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the send and close timeouts for every session.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the templates for lines posted to the platform.
    pub fn templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    /// Binds the chat socket and assembles the server.
    pub async fn build<A, D, P>(
        self,
        auth: A,
        directory: D,
        platform: P,
    ) -> Result<RelayServer<A, D, P>, RelayError>
    where
        A: Authenticator,
        D: Directory,
        P: ChatPlatform,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        tracing::info!(addr = %transport.local_addr()?, "chat socket listening");

        let state = Arc::new(ServerState {
            registry: Mutex::new(SessionRegistry::new(self.session_config.clone())),
            relay: Relay::new(directory, platform, self.templates),
            auth,
            session_config: self.session_config,
        });

        Ok(RelayServer { transport, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A relay server bound to its chat socket.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<A, D, P> {
    transport: WebSocketTransport,
    state: Arc<ServerState<WebSocketConnection, A, D, P>>,
}

impl<A, D, P> RelayServer<A, D, P>
where
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    /// Returns the local address the chat socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for delivering platform chat into the game.
    pub fn handle(&self) -> RelayHandle<A, D, P> {
        RelayHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Runs the accept loop until `shutdown` is cancelled.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until_cancelled(mut self, shutdown: CancellationToken) -> Result<(), RelayError> {
        tracing::info!("relay server running");

        loop {
            let accepted = tokio::select! {
                accepted = self.transport.accept() => accepted,
                () = shutdown.cancelled() => {
                    tracing::info!("relay server stopping");
                    return Ok(());
                }
            };
            match accepted {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match WebSocketTransport::upgrade(pending).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "upgrade refused");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::debug!(error = %e, "accept failed");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound from the chat platform
// ---------------------------------------------------------------------------

/// A message posted in a relay channel on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundChat {
    pub channel: ChannelId,
    /// Display name of the author.
    pub author: String,
    /// Bots never reach the game, including the relay's own posts.
    pub author_is_bot: bool,
    pub content: String,
    /// File names of attachments, each appended as `<name>` on its own line.
    pub attachments: Vec<String>,
    /// Display name of the author of the message being replied to.
    pub replying_to: Option<String>,
}

/// Cloneable entry point for chat flowing from the platform to the game.
pub struct RelayHandle<A, D, P> {
    state: Arc<ServerState<WebSocketConnection, A, D, P>>,
}

impl<A, D, P> Clone for RelayHandle<A, D, P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, D, P> RelayHandle<A, D, P>
where
    A: Authenticator,
    D: Directory,
    P: ChatPlatform,
{
    /// Sends a local chat line to every session of `account`, whatever
    /// server they are on. Returns how many sessions received it.
    pub async fn deliver_local_to_game(
        &self,
        account: &AccountId,
        name: &str,
        message: &str,
        replying_to: Option<&str>,
    ) -> usize {
        let sessions = self.state.registry.lock().await.lookup(account);
        if sessions.is_empty() {
            return 0;
        }

        let local = ChatMessage::local(name, message, replying_to.map(str::to_owned));
        let results = join_all(sessions.iter().map(|s| s.send(&local))).await;

        let mut delivered = 0;
        for (session, result) in sessions.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(conn_id = %session.id(), error = %e, "local delivery failed");
                }
            }
        }
        delivered
    }

    /// Relays a platform message to every account present on its channel.
    /// Returns how many sessions received it.
    pub async fn relay_from_channel(&self, chat: InboundChat) -> usize {
        if chat.author_is_bot {
            return 0;
        }

        let mut message = chat.content;
        for attachment in &chat.attachments {
            message.push_str(&format!("\n<{attachment}>"));
        }

        let mut accounts: Vec<AccountId> = Vec::new();
        for entry in self.state.relay.present(chat.channel).await {
            if !accounts.contains(&entry.account) {
                accounts.push(entry.account);
            }
        }

        let mut delivered = 0;
        for account in &accounts {
            delivered += self
                .deliver_local_to_game(account, &chat.author, &message, chat.replying_to.as_deref())
                .await;
        }
        delivered
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.state.registry.lock().await.len()
    }
}
