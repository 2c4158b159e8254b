//! Unified error type for the relay.

use relaycord_auth::AuthError;
use relaycord_protocol::ProtocolError;
use relaycord_session::SessionError;
use relaycord_transport::TransportError;

use crate::directory::DirectoryError;
use crate::platform::PlatformError;
use crate::resolve::ResolveError;

/// Text of the `Error` reply for anything that is not the client's fault.
pub const INTERNAL_ERROR_TEXT: &str = "Internal error";

/// A well-formed message that is not valid in the session's current
/// state. The text is what the client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    /// `Join` while already affiliated with a server.
    #[error("Leave current server first")]
    AlreadyAffiliated,

    /// `Leave`, `Global` or `Local` without an affiliation.
    #[error("Join a server first")]
    NotAffiliated,
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The connection's credential was refused; no session was created.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The message was malformed for its type.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The message was valid but not allowed right now.
    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The channel directory could not answer.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The chat platform refused or failed a delivery.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A message handler failed without a typed error (e.g. panicked).
    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// The text of the `Error` reply a client gets for this failure.
    ///
    /// Protocol and precondition errors describe what the client did
    /// wrong; everything else is reported generically.
    pub fn reply_text(&self) -> String {
        match self {
            Self::Protocol(e) => e.to_string(),
            Self::Precondition(p) => p.to_string(),
            _ => INTERNAL_ERROR_TEXT.to_string(),
        }
    }

    /// Whether the failure is the client's doing rather than the relay's.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Precondition(_))
    }
}

impl From<figment::Error> for RelayError {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}
