//! Presence and relay-proxy election for Relaycord.
//!
//! For every relay channel the engine keeps the accounts currently playing
//! on that channel's game server, in the order they joined. The account
//! at the head of the list is the channel's *proxy*: the one client whose
//! global chat is mirrored to the channel.
//!
//! ```text
//!   join(A)   join(B)   leave(A)        leave(B)
//!   [A]  ──→  [A, B] ──→ [B]       ──→  (channel removed)
//!    ↑ proxy              ↑ new proxy        no proxy
//! ```
//!
//! Election is strictly FIFO: a channel only gains a proxy through
//! [`PresenceMap::join`] on an empty list and only loses it when the proxy
//! itself leaves.
//!
//! # Concurrency note
//!
//! Like the session registry, `PresenceMap` is a plain map. The relay
//! holds it behind a single mutex and never does I/O under that lock:
//! it takes the decision here, releases, then announces.

use std::collections::HashMap;

use relaycord_protocol::{AccountId, ChannelId};

/// One account present on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub account: AccountId,
    pub name: String,
}

/// Outcome of [`PresenceMap::leave`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departure {
    /// The removed entry was the channel's proxy.
    pub was_proxy: bool,
    /// Display name of the account that took over as proxy. Always `None`
    /// when `was_proxy` is false, and when the channel emptied.
    pub new_proxy: Option<String>,
}

/// Ordered presence lists per relay channel.
///
/// A channel with no one present has no entry at all.
#[derive(Debug, Default)]
pub struct PresenceMap {
    channels: HashMap<ChannelId, Vec<PresenceEntry>>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an account to the channel's list.
    ///
    /// Returns `true` iff the list was empty, i.e. the account is now the
    /// channel's proxy.
    pub fn join(&mut self, channel: ChannelId, account: AccountId, name: impl Into<String>) -> bool {
        let entries = self.channels.entry(channel).or_default();
        let is_new_proxy = entries.is_empty();
        entries.push(PresenceEntry {
            account,
            name: name.into(),
        });

        tracing::debug!(%channel, %account, present = entries.len(), "presence joined");
        if is_new_proxy {
            tracing::info!(%channel, %account, "proxy assigned");
        }
        is_new_proxy
    }

    /// Removes the account's first entry from the channel's list.
    ///
    /// When that entry was the proxy, the returned [`Departure`] names the
    /// successor (the next-oldest entry), if any. The channel is dropped
    /// once its list is empty. Leaving a channel the account is not on is
    /// a no-op.
    pub fn leave(&mut self, channel: ChannelId, account: &AccountId) -> Departure {
        let Some(entries) = self.channels.get_mut(&channel) else {
            return Departure::default();
        };
        let Some(index) = entries.iter().position(|e| e.account == *account) else {
            return Departure::default();
        };

        entries.remove(index);
        let was_proxy = index == 0;
        let new_proxy = if was_proxy {
            entries.first().map(|e| e.name.clone())
        } else {
            None
        };
        if entries.is_empty() {
            self.channels.remove(&channel);
        }

        tracing::debug!(%channel, %account, was_proxy, "presence left");
        if was_proxy {
            match &new_proxy {
                Some(name) => tracing::info!(%channel, new_proxy = %name, "proxy reassigned"),
                None => tracing::info!(%channel, "channel has no proxy"),
            }
        }
        Departure { was_proxy, new_proxy }
    }

    /// Returns `true` iff the account heads the channel's list.
    pub fn proxy_is(&self, channel: ChannelId, account: &AccountId) -> bool {
        self.proxy(channel).is_some_and(|e| e.account == *account)
    }

    /// The channel's current proxy, if anyone is present.
    pub fn proxy(&self, channel: ChannelId) -> Option<&PresenceEntry> {
        self.channels.get(&channel).and_then(|entries| entries.first())
    }

    /// Snapshot of everyone present on the channel, oldest first.
    pub fn members(&self, channel: ChannelId) -> Vec<PresenceEntry> {
        self.channels.get(&channel).cloned().unwrap_or_default()
    }

    /// Number of channels with at least one account present.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
