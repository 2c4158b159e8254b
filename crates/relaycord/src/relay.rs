//! Presence changes and chat delivery toward the chat platform.
//!
//! [`Relay`] is the collaborator the router drives: it resolves which
//! channels an account's chat belongs to, keeps the [`PresenceMap`] in
//! step with joins and leaves, and posts formatted lines to the platform.
//!
//! Presence decisions are taken under the presence lock; every platform
//! call happens after it is released. Deliveries are best-effort: a
//! failed post is logged and the remaining channels are still served.

use futures_util::future::join_all;
use regex::Regex;
use relaycord_presence::{PresenceEntry, PresenceMap};
use relaycord_protocol::{AccountId, ChannelId, Identity, ServerAddress};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::RelayError;
use crate::directory::{Directory, RelayChannel};
use crate::platform::ChatPlatform;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Message templates for lines posted to the platform. `{0}` and `{1}`
/// are replaced by positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    /// Global chat: `{0}` sender, `{1}` text.
    pub global: String,
    /// Local chat from the game: `{0}` sender, `{1}` text.
    pub local: String,
    /// A channel gained a proxy: `{0}` the proxy's name.
    pub assigned_proxy: String,
    /// The last player on a channel left.
    pub no_proxy: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            global: "*{0}*: {1}".to_string(),
            local: "*{0}*: {1}".to_string(),
            assigned_proxy: "*{0}* is now proxying chat".to_string(),
            no_proxy: "No players left to proxy chat".to_string(),
        }
    }
}

/// Fills `{N}` slots in `template` from `args` in a single pass, so an
/// argument containing `{1}` is never substituted again. Slots without a
/// matching argument are left as written.
pub fn render(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let slot = after
            .find('}')
            .and_then(|close| after[..close].parse::<usize>().ok().map(|n| (n, close)));
        match slot.and_then(|(n, close)| args.get(n).map(|arg| (arg, close))) {
            Some((arg, close)) => {
                out.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Sender and text of a raw global chat line, from the pattern's first
/// two capture groups.
fn extract<'a>(pattern: &Regex, line: &'a str) -> Option<(&'a str, &'a str)> {
    let captures = pattern.captures(line)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Presence state plus the directory and platform it talks to.
pub struct Relay<D, P> {
    directory: D,
    platform: P,
    presence: Mutex<PresenceMap>,
    templates: Templates,
}

impl<D: Directory, P: ChatPlatform> Relay<D, P> {
    pub fn new(directory: D, platform: P, templates: Templates) -> Self {
        Self {
            directory,
            platform,
            presence: Mutex::new(PresenceMap::new()),
            templates,
        }
    }

    /// Adds the player to every channel it relays to on `server` and
    /// announces each channel where it became the proxy.
    pub async fn notify_joined(
        &self,
        server: ServerAddress,
        identity: &Identity,
    ) -> Result<(), RelayError> {
        let channels = self.directory.relay_channels(&identity.account, &server).await?;

        let new_proxy_in: Vec<ChannelId> = {
            let mut presence = self.presence.lock().await;
            channels
                .iter()
                .filter(|c| presence.join(c.id, identity.account, identity.name.clone()))
                .map(|c| c.id)
                .collect()
        };

        let announcement = render(&self.templates.assigned_proxy, &[&identity.name]);
        self.post_all(new_proxy_in.into_iter().map(|id| (id, announcement.clone())))
            .await;
        Ok(())
    }

    /// Removes the account from every channel it relays to on `server`
    /// and announces each channel whose proxy changed.
    pub async fn notify_left(
        &self,
        server: ServerAddress,
        account: &AccountId,
    ) -> Result<(), RelayError> {
        let channels = self.directory.relay_channels(account, &server).await?;

        let announcements: Vec<(ChannelId, String)> = {
            let mut presence = self.presence.lock().await;
            channels
                .iter()
                .filter_map(|c| {
                    let departure = presence.leave(c.id, account);
                    if !departure.was_proxy {
                        return None;
                    }
                    let text = match departure.new_proxy {
                        Some(name) => render(&self.templates.assigned_proxy, &[&name]),
                        None => self.templates.no_proxy.clone(),
                    };
                    Some((c.id, text))
                })
                .collect()
        };

        self.post_all(announcements).await;
        Ok(())
    }

    /// Relays a raw global chat line through every channel on `server`
    /// where `account` is the proxy and the channel's pattern matches.
    ///
    /// Returns how many channels received the line; zero is not an error.
    pub async fn deliver_global(
        &self,
        server: ServerAddress,
        account: &AccountId,
        line: &str,
    ) -> Result<usize, RelayError> {
        let channels = self.directory.relay_channels(account, &server).await?;

        let proxied: Vec<RelayChannel> = {
            let presence = self.presence.lock().await;
            channels
                .into_iter()
                .filter(|c| presence.proxy_is(c.id, account))
                .collect()
        };

        let mut posts = Vec::with_capacity(proxied.len());
        for channel in proxied {
            match extract(&channel.pattern, line) {
                Some((sender, text)) => {
                    posts.push((channel.id, render(&self.templates.global, &[sender, text])));
                }
                None => tracing::debug!(channel = %channel.id, "global line did not match pattern"),
            }
        }

        Ok(self.post_all(posts).await)
    }

    /// Posts a local chat message from the game to every channel on
    /// `server` the account relays to, proxy or not.
    pub async fn deliver_local_from_game(
        &self,
        server: ServerAddress,
        identity: &Identity,
        message: &str,
    ) -> Result<usize, RelayError> {
        let channels = self.directory.relay_channels(&identity.account, &server).await?;
        let text = render(&self.templates.local, &[&identity.name, message]);
        Ok(self
            .post_all(channels.into_iter().map(|c| (c.id, text.clone())))
            .await)
    }

    /// Everyone present on a channel, oldest first.
    pub async fn present(&self, channel: ChannelId) -> Vec<PresenceEntry> {
        self.presence.lock().await.members(channel)
    }

    /// Whether `account` is the channel's proxy.
    pub async fn proxy_is(&self, channel: ChannelId, account: &AccountId) -> bool {
        self.presence.lock().await.proxy_is(channel, account)
    }

    /// Posts every `(channel, text)` pair concurrently and returns how
    /// many succeeded.
    async fn post_all(&self, posts: impl IntoIterator<Item = (ChannelId, String)>) -> usize {
        let results = join_all(posts.into_iter().map(|(channel, text)| async move {
            let result = self.platform.send_message(channel, &text).await;
            if let Err(e) = &result {
                tracing::warn!(%channel, error = %e, "platform delivery failed");
            }
            result.is_ok()
        }))
        .await;
        results.into_iter().filter(|delivered| *delivered).count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use uuid::Uuid;

    use super::*;
    use crate::directory::{DEFAULT_PATTERN, DirectoryError};
    use crate::platform::PlatformError;

    /// Binds channels 1 and 2 to one server for every account.
    struct TwoChannels {
        pattern_2: &'static str,
    }

    impl Directory for TwoChannels {
        async fn relay_channels(
            &self,
            _account: &AccountId,
            server: &ServerAddress,
        ) -> Result<Vec<RelayChannel>, DirectoryError> {
            Ok(vec![
                RelayChannel::with_default_pattern(ChannelId(1), *server),
                RelayChannel::new(ChannelId(2), *server, self.pattern_2).unwrap(),
            ])
        }
    }

    #[derive(Default)]
    struct Recorder {
        posts: StdMutex<Vec<(u64, String)>>,
    }

    impl ChatPlatform for Recorder {
        async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), PlatformError> {
            self.posts.lock().unwrap().push((channel.0, content.to_string()));
            Ok(())
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<(u64, String)> {
            let mut posts = std::mem::take(&mut *self.posts.lock().unwrap());
            posts.sort();
            posts
        }
    }

    fn relay(pattern_2: &'static str) -> Relay<TwoChannels, Recorder> {
        Relay::new(
            TwoChannels { pattern_2 },
            Recorder::default(),
            Templates::default(),
        )
    }

    fn player(n: u128, name: &str) -> Identity {
        Identity {
            account: AccountId(Uuid::from_u128(n)),
            name: name.to_string(),
        }
    }

    fn server() -> ServerAddress {
        "1.2.3.4:25565".parse().unwrap()
    }

    #[test]
    fn test_render_fills_positional_slots() {
        assert_eq!(render("*{0}*: {1}", &["Steve", "hi"]), "*Steve*: hi");
    }

    #[test]
    fn test_render_does_not_expand_slots_inside_arguments() {
        assert_eq!(render("{0} says {1}", &["{1}", "x"]), "{1} says x");
    }

    #[test]
    fn test_render_leaves_unknown_slots_and_braces() {
        assert_eq!(render("{0} {2} {x} {", &["a"]), "a {2} {x} {");
    }

    #[test]
    fn test_extract_uses_first_two_groups() {
        let pattern = Regex::new(DEFAULT_PATTERN).unwrap();
        assert_eq!(extract(&pattern, "<Steve> hello there"), Some(("Steve", "hello there")));
        assert_eq!(extract(&pattern, "Steve joined the game"), None);
    }

    #[tokio::test]
    async fn test_notify_joined_first_player_is_announced_as_proxy() {
        let relay = relay(DEFAULT_PATTERN);

        relay.notify_joined(server(), &player(1, "A")).await.unwrap();
        relay.notify_joined(server(), &player(2, "B")).await.unwrap();

        assert_eq!(
            relay.platform.take(),
            vec![
                (1, "*A* is now proxying chat".to_string()),
                (2, "*A* is now proxying chat".to_string()),
            ]
        );
        let names: Vec<_> = relay.present(ChannelId(1)).await.into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_notify_left_proxy_announces_successor_once() {
        let relay = relay(DEFAULT_PATTERN);
        let (a, b) = (player(1, "A"), player(2, "B"));
        relay.notify_joined(server(), &a).await.unwrap();
        relay.notify_joined(server(), &b).await.unwrap();
        relay.platform.take();

        relay.notify_left(server(), &a.account).await.unwrap();

        assert_eq!(
            relay.platform.take(),
            vec![
                (1, "*B* is now proxying chat".to_string()),
                (2, "*B* is now proxying chat".to_string()),
            ]
        );
        assert!(relay.proxy_is(ChannelId(1), &b.account).await);
    }

    #[tokio::test]
    async fn test_notify_left_non_proxy_is_silent_and_last_announces_no_proxy() {
        let relay = relay(DEFAULT_PATTERN);
        let (a, b) = (player(1, "A"), player(2, "B"));
        relay.notify_joined(server(), &a).await.unwrap();
        relay.notify_joined(server(), &b).await.unwrap();
        relay.platform.take();

        relay.notify_left(server(), &b.account).await.unwrap();
        assert!(relay.platform.take().is_empty());

        relay.notify_left(server(), &a.account).await.unwrap();
        assert_eq!(
            relay.platform.take(),
            vec![
                (1, "No players left to proxy chat".to_string()),
                (2, "No players left to proxy chat".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_deliver_global_only_through_proxy() {
        let relay = relay(DEFAULT_PATTERN);
        let (a, b) = (player(1, "A"), player(2, "B"));
        relay.notify_joined(server(), &a).await.unwrap();
        relay.notify_joined(server(), &b).await.unwrap();
        relay.platform.take();

        let from_b = relay.deliver_global(server(), &b.account, "<B> hi").await.unwrap();
        assert_eq!(from_b, 0);
        assert!(relay.platform.take().is_empty());

        let from_a = relay.deliver_global(server(), &a.account, "<B> hi").await.unwrap();
        assert_eq!(from_a, 2);
        assert_eq!(
            relay.platform.take(),
            vec![(1, "*B*: hi".to_string()), (2, "*B*: hi".to_string())]
        );
    }

    #[tokio::test]
    async fn test_deliver_global_skips_channels_whose_pattern_does_not_match() {
        let relay = relay(r"^\[(\w+)\] (.*)$");
        let a = player(1, "A");
        relay.notify_joined(server(), &a).await.unwrap();
        relay.platform.take();

        let delivered = relay.deliver_global(server(), &a.account, "<A> hello").await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(relay.platform.take(), vec![(1, "*A*: hello".to_string())]);

        let delivered = relay
            .deliver_global(server(), &a.account, "A has made the advancement")
            .await
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_deliver_local_from_game_ignores_proxy_status() {
        let relay = relay(DEFAULT_PATTERN);
        let (a, b) = (player(1, "A"), player(2, "B"));
        relay.notify_joined(server(), &a).await.unwrap();
        relay.notify_joined(server(), &b).await.unwrap();
        relay.platform.take();

        let delivered = relay.deliver_local_from_game(server(), &b, "psst").await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(
            relay.platform.take(),
            vec![(1, "*B*: psst".to_string()), (2, "*B*: psst".to_string())]
        );
    }
}
