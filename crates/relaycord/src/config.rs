//! Process configuration.
//!
//! Layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `RELAYCORD_*` environment variables, nested keys split on `__`
//!    (`RELAYCORD_DISCORD__TOKEN` sets `discord.token`)
//!
//! ```toml
//! ws_bind = "0.0.0.0:8081"
//! auth_secret = "..."
//!
//! [discord]
//! token = "..."
//!
//! [[channels]]
//! id = 1171802059343921173
//! guild = 1138432261411324025
//! server = "play.example.org"
//!
//! [[links]]
//! account = "069a79f4-44e9-4726-a5be-fca90e38aaf5"
//! guild = 1138432261411324025
//! user = 300000000000000000
//! ```

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use relaycord_protocol::{AccountId, ChannelId};
use relaycord_session::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::RelayError;
use crate::directory::{AccountLink, ChannelBinding, DEFAULT_PATTERN, RelayChannel, StaticDirectory};
use crate::platform::DiscordRest;
use crate::relay::Templates;
use crate::resolve::Resolver;

const ENV_PREFIX: &str = "RELAYCORD_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Chat socket listener.
    pub ws_bind: String,
    /// Auth endpoints listener.
    pub http_bind: String,
    /// HMAC key for credentials. Generated per process when unset, which
    /// invalidates every credential on restart.
    pub auth_secret: Option<String>,
    pub session_service_url: String,
    pub send_timeout_secs: u64,
    pub close_timeout_secs: u64,
    pub discord: DiscordConfig,
    pub templates: Templates,
    pub channels: Vec<ChannelConfig>,
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    pub api_base: String,
}

/// A relay channel as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: u64,
    pub guild: u64,
    /// `a.b.c.d[:port]` or a hostname, resolved at startup.
    pub server: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub account: AccountId,
    pub guild: u64,
    pub user: u64,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

impl Default for Config {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            ws_bind: "0.0.0.0:8081".to_string(),
            http_bind: "0.0.0.0:8080".to_string(),
            auth_secret: None,
            session_service_url: relaycord_auth::MojangSessionService::DEFAULT_URL.to_string(),
            send_timeout_secs: session.send_timeout.as_secs(),
            close_timeout_secs: session.close_timeout.as_secs(),
            discord: DiscordConfig::default(),
            templates: Templates::default(),
            channels: Vec::new(),
            links: Vec::new(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DiscordRest::DEFAULT_API_BASE.to_string(),
        }
    }
}

impl Config {
    /// Loads defaults, then `path` if given, then the environment.
    ///
    /// # Errors
    /// A missing file, malformed TOML, or a value of the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, RelayError> {
        let mut figment = Self::defaults();
        if let Some(path) = path {
            if !path.is_file() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file {} not found", path.display()),
                )
                .into());
            }
            figment = figment.merge(Toml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            send_timeout: Duration::from_secs(self.send_timeout_secs),
            close_timeout: Duration::from_secs(self.close_timeout_secs),
        }
    }

    /// Builds the channel directory, resolving each channel's server.
    ///
    /// A channel whose server cannot be resolved is logged and left out;
    /// the rest still relay.
    pub async fn directory(&self, resolver: &Resolver) -> StaticDirectory {
        let mut bindings = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let server = match resolver.resolve(&channel.server).await {
                Ok(server) => server,
                Err(e) => {
                    tracing::error!(
                        channel = channel.id,
                        server = %channel.server,
                        error = %e,
                        "relay channel skipped"
                    );
                    continue;
                }
            };
            match RelayChannel::new(ChannelId(channel.id), server, &channel.pattern) {
                Ok(relay_channel) => {
                    tracing::info!(channel = channel.id, %server, "relay channel bound");
                    bindings.push(ChannelBinding {
                        guild: channel.guild,
                        channel: relay_channel,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        channel = channel.id,
                        pattern = %channel.pattern,
                        error = %e,
                        "relay channel skipped: invalid pattern"
                    );
                }
            }
        }

        let links = self
            .links
            .iter()
            .map(|link| AccountLink {
                account: link.account,
                guild: link.guild,
                user: link.user,
            })
            .collect();

        StaticDirectory::new(bindings, links)
    }
}
