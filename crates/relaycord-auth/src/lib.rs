//! Game-account authentication for Relaycord.
//!
//! A client proves it owns a game account in two steps:
//!
//! 1. [`Handshake::begin`] issues an *unverified* credential naming the
//!    player (5 minute lifetime).
//! 2. The client tells the game's session service it joined a server
//!    whose id is the SHA-1 of that credential ([`server_id`]).
//! 3. [`Handshake::verify`] asks the session service whether that join
//!    happened and, if the names match, issues a *verified* credential
//!    carrying the account id (1 day lifetime).
//!
//! Verified credentials are what the chat socket accepts; the
//! [`TokenSigner`] implements the session layer's `Authenticator` hook.

mod credential;
mod error;
mod handshake;
mod verifier;

pub use credential::{Claims, CredentialKind, IssuedCredential, TokenSigner};
pub use error::AuthError;
pub use handshake::{Handshake, server_id};
pub use verifier::{MojangSessionService, PlayerProfile, SessionVerifier};
