//! The session registry: every admitted session, indexed by account.
//!
//! One account may hold several sessions at once (the same player signed
//! in from more than one client). Chat relayed from the platform goes to
//! all of them, so the index maps an account to a list, not a single
//! session.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself; it uses a plain
//! `HashMap`. The server wraps it in one mutex, and every method here
//! only touches the index: no I/O happens while the lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use relaycord_protocol::{AccountId, Identity};
use relaycord_transport::Connection;

use crate::{Session, SessionConfig};

/// Index of live sessions by account id.
pub struct SessionRegistry<C: Connection> {
    sessions: HashMap<AccountId, Vec<Arc<Session<C>>>>,
    config: SessionConfig,
}

impl<C: Connection> SessionRegistry<C> {
    /// Creates an empty registry whose sessions use `config`.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Creates a session for an authenticated connection and indexes it.
    ///
    /// Never rejects: existing sessions for the same account are kept.
    pub fn admit(&mut self, identity: Identity, connection: C) -> Arc<Session<C>> {
        let account = identity.account;
        let session = Arc::new(Session::new(identity, connection, self.config.clone()));
        self.sessions
            .entry(account)
            .or_default()
            .push(Arc::clone(&session));

        tracing::info!(
            conn_id = %session.id(),
            %account,
            name = session.name(),
            "session admitted"
        );
        session
    }

    /// Returns the account's current sessions; empty if there are none.
    pub fn lookup(&self, account: &AccountId) -> Vec<Arc<Session<C>>> {
        self.sessions.get(account).cloned().unwrap_or_default()
    }

    /// Removes a session from its account's list, dropping the account
    /// entry once the list is empty.
    ///
    /// Returns `false` if the session was not registered.
    pub fn evict(&mut self, session: &Session<C>) -> bool {
        let account = session.account();
        let Some(list) = self.sessions.get_mut(&account) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id() != session.id());
        let removed = list.len() != before;
        if list.is_empty() {
            self.sessions.remove(&account);
        }

        if removed {
            tracing::info!(conn_id = %session.id(), %account, "session evicted");
        }
        removed
    }

    /// Number of registered sessions across all accounts.
    pub fn len(&self) -> usize {
        self.sessions.values().map(Vec::len).sum()
    }

    /// Returns `true` if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of accounts with at least one session.
    pub fn account_count(&self) -> usize {
        self.sessions.len()
    }
}

// =========================================================================
// Tests
// =========================================================================
