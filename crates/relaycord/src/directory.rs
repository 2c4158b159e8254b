//! Which relay channels a player's chat goes to.
//!
//! Channel bindings and account links live outside the relay. The router
//! only ever asks one question of them: "for this account playing on this
//! server, which channels relay its chat?"

use std::collections::HashSet;
use std::future::Future;

use regex::Regex;
use relaycord_protocol::{AccountId, ChannelId, ServerAddress};

/// Pattern used when a binding does not configure one: vanilla
/// `<name> message` chat lines.
pub const DEFAULT_PATTERN: &str = "<(.*)> (.*)";

/// A chat-platform channel mirroring one game server.
#[derive(Debug, Clone)]
pub struct RelayChannel {
    pub id: ChannelId,
    pub server: ServerAddress,
    /// Its first two capture groups extract the sender name and text from
    /// a raw global chat line.
    pub pattern: Regex,
}

impl RelayChannel {
    /// Compiles `pattern` once, when the binding is made.
    pub fn new(id: ChannelId, server: ServerAddress, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            id,
            server,
            pattern: Regex::new(pattern)?,
        })
    }

    /// A channel extracting vanilla `<name> message` lines.
    pub fn with_default_pattern(id: ChannelId, server: ServerAddress) -> Self {
        Self {
            id,
            server,
            pattern: default_pattern(),
        }
    }
}

impl PartialEq for RelayChannel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.server == other.server
            && self.pattern.as_str() == other.pattern.as_str()
    }
}

impl Eq for RelayChannel {}

fn default_pattern() -> Regex {
    static DEFAULT: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        Regex::new(DEFAULT_PATTERN).unwrap_or_else(|e| unreachable!("default pattern: {e}"))
    });
    DEFAULT.clone()
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of channel bindings and account links.
pub trait Directory: Send + Sync + 'static {
    /// Channels bound to `server` in every guild `account` is linked in.
    fn relay_channels(
        &self,
        account: &AccountId,
        server: &ServerAddress,
    ) -> impl Future<Output = Result<Vec<RelayChannel>, DirectoryError>> + Send;
}

/// A channel binding inside a chat-platform guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub guild: u64,
    pub channel: RelayChannel,
}

/// A game account linked to a platform user in a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLink {
    pub account: AccountId,
    pub guild: u64,
    pub user: u64,
}

/// [`Directory`] over a fixed set of bindings and links.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    bindings: Vec<ChannelBinding>,
    links: Vec<AccountLink>,
}

impl StaticDirectory {
    pub fn new(bindings: Vec<ChannelBinding>, links: Vec<AccountLink>) -> Self {
        Self { bindings, links }
    }

    pub fn bindings(&self) -> &[ChannelBinding] {
        &self.bindings
    }

    fn lookup(&self, account: &AccountId, server: &ServerAddress) -> Vec<RelayChannel> {
        let guilds: HashSet<u64> = self
            .links
            .iter()
            .filter(|link| link.account == *account)
            .map(|link| link.guild)
            .collect();

        let mut seen = HashSet::new();
        self.bindings
            .iter()
            .filter(|b| guilds.contains(&b.guild) && b.channel.server == *server)
            .filter(|b| seen.insert(b.channel.id))
            .map(|b| b.channel.clone())
            .collect()
    }
}

impl Directory for StaticDirectory {
    async fn relay_channels(
        &self,
        account: &AccountId,
        server: &ServerAddress,
    ) -> Result<Vec<RelayChannel>, DirectoryError> {
        Ok(self.lookup(account, server))
    }
}
