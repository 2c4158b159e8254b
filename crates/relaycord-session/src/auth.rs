//! Authentication hook for admitting chat socket connections.
//!
//! The session layer doesn't know what a credential looks like. It hands
//! the bearer token from the upgrade request to an [`Authenticator`] and
//! gets back the [`Identity`] the session will carry, or an error that
//! refuses the connection before any session exists.

use relaycord_protocol::Identity;

use crate::SessionError;

/// Validates a connection's credential and returns its identity.
///
/// # Example
///
/// ```rust
/// use relaycord_protocol::{AccountId, Identity};
/// use relaycord_session::{Authenticator, SessionError};
///
/// /// Treats the token as an account id; the name is fixed.
/// /// Only for tests.
/// struct TrustingAuthenticator;
///
/// impl Authenticator for TrustingAuthenticator {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<Identity, SessionError> {
///         let account: AccountId = token
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("not an account id".into()))?;
///         Ok(Identity { account, name: "Steve".into() })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the session identity.
    ///
    /// # Returns
    /// - `Ok(Identity)`: the credential is a verified one
    /// - `Err(SessionError::AuthFailed)`: the credential is invalid,
    ///   expired, or not yet verified
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}
