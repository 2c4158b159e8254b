//! Chat socket sessions for Relaycord.
//!
//! This crate handles the lifecycle of game-client connections:
//!
//! 1. **Authentication**: turning a bearer credential into an identity
//!    ([`Authenticator`] trait)
//! 2. **Sessions**: one accepted connection with its identity, current
//!    game-server affiliation, bounded sends, and lifetime ([`Session`])
//! 3. **Registry**: who is connected, indexed by account so chat from the
//!    platform can be fanned out ([`SessionRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay layer (above)   ← routes messages and drives presence
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol / transport (below)
//! ```

mod auth;
mod error;
mod registry;
mod session;
#[cfg(test)]
mod testing;

pub use auth::Authenticator;
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Session, SessionConfig};
