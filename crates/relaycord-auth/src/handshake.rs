//! The begin/verify challenge.

use relaycord_protocol::AccountId;
use sha1::{Digest, Sha1};

use crate::{AuthError, CredentialKind, IssuedCredential, SessionVerifier, TokenSigner};

/// Server id a client must announce to the session service for `token`:
/// the lowercase hex SHA-1 of the exact token text.
///
/// Tying the announced join to this credential means a confirmation
/// cannot be replayed for a different name.
pub fn server_id(token: &str) -> String {
    hex::encode(Sha1::digest(token.as_bytes()))
}

/// Issues and upgrades credentials.
#[derive(Debug, Clone)]
pub struct Handshake<V> {
    signer: TokenSigner,
    verifier: V,
}

impl<V: SessionVerifier> Handshake<V> {
    pub fn new(signer: TokenSigner, verifier: V) -> Self {
        Self { signer, verifier }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issues an unverified credential for `name`, exactly as given.
    /// Names are not reserved; anyone may begin as anyone.
    ///
    /// # Errors
    /// [`AuthError::BadRequest`] for an empty name.
    pub fn begin(&self, name: &str) -> Result<IssuedCredential, AuthError> {
        if name.is_empty() {
            return Err(AuthError::BadRequest("username is required"));
        }
        self.signer.issue(name, None)
    }

    /// Exchanges an unverified credential for a verified one.
    ///
    /// The session service must confirm a join under [`server_id`] of
    /// `token`, and report exactly the credential's name.
    ///
    /// # Errors
    /// - [`AuthError::InvalidToken`] if `token` is not a live unverified
    ///   credential
    /// - [`AuthError::Unauthorized`] if the service does not vouch for it
    /// - [`AuthError::ServiceUnavailable`] if the service is unreachable
    pub async fn verify(&self, token: &str) -> Result<IssuedCredential, AuthError> {
        let claims = self.signer.decode(token)?;
        if claims.kind() != CredentialKind::Unverified {
            return Err(AuthError::InvalidToken("already verified"));
        }

        let profile = self
            .verifier
            .has_joined(&claims.name, &server_id(token))
            .await?;
        if profile.name != claims.name {
            tracing::warn!(
                claimed = %claims.name,
                reported = %profile.name,
                "session service reported a different name"
            );
            return Err(AuthError::Unauthorized("name mismatch".into()));
        }

        let account: AccountId = profile.id;
        tracing::info!(name = %claims.name, %account, "account verified");
        self.signer.issue(&claims.name, Some(account))
    }
}
