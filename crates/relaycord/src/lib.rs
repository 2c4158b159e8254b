//! # Relaycord
//!
//! Bridges in-game chat between Minecraft clients and Discord channels.
//!
//! Clients authenticate through the HTTP handshake ([`http::auth_router`]),
//! then hold a WebSocket open to the relay. Each session joins the game
//! server it is playing on; per relay channel, the earliest present player
//! is the *proxy* whose view of global chat is forwarded, so a line seen by
//! ten players is posted once. Local chat flows both ways.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaycord::prelude::*;
//!
//! # async fn run() -> Result<(), RelayError> {
//! let config = Config::load(None)?;
//! let directory = config.directory(&Resolver::from_system()).await;
//! let platform = DiscordRest::new(&config.discord.token, &config.discord.api_base);
//!
//! let server = RelayServerBuilder::new()
//!     .bind(&config.ws_bind)
//!     .session_config(config.session_config())
//!     .templates(config.templates.clone())
//!     .build(TokenSigner::new("secret"), directory, platform)
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
mod handler;
pub mod http;
pub mod platform;
pub mod relay;
pub mod resolve;
mod router;
mod server;

pub use config::Config;
pub use directory::{Directory, RelayChannel, StaticDirectory};
pub use error::{Precondition, RelayError};
pub use platform::{ChatPlatform, DiscordRest};
pub use relay::{Relay, Templates};
pub use resolve::Resolver;
pub use router::SESSION_REPLACED_TEXT;
pub use server::{InboundChat, RelayHandle, RelayServer, RelayServerBuilder};

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::directory::{Directory, RelayChannel, StaticDirectory};
    pub use crate::error::RelayError;
    pub use crate::platform::{ChatPlatform, DiscordRest};
    pub use crate::resolve::Resolver;
    pub use crate::server::{InboundChat, RelayHandle, RelayServer, RelayServerBuilder};
    pub use relaycord_auth::{Handshake, MojangSessionService, TokenSigner};
    pub use relaycord_protocol::{AccountId, ChannelId, ServerAddress};
}
