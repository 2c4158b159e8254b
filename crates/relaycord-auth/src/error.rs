//! Error types for the auth handshake.

/// Errors from issuing, decoding, or verifying credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The session service did not vouch for the claimed name.
    #[error("verification rejected: {0}")]
    Unauthorized(String),

    /// The presented credential is malformed, forged, expired, or of the
    /// wrong kind for the operation.
    #[error("invalid credential: {0}")]
    InvalidToken(&'static str),

    /// The request itself is unusable (e.g. an empty name).
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// The session service could not be reached.
    #[error("session service unreachable: {0}")]
    ServiceUnavailable(#[source] reqwest::Error),

    /// Claims could not be serialized or the signing key was rejected.
    #[error("credential could not be signed")]
    Signing,
}
