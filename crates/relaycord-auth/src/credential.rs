//! Signed, time-bounded identity credentials.
//!
//! A credential is an HS256 JSON Web Token. Claims are immutable once
//! signed; verification issues a new token instead of editing the old one.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use relaycord_protocol::{AccountId, Identity};
use relaycord_session::{Authenticator, SessionError};
use serde::{Deserialize, Serialize};

use crate::AuthError;

const ISSUER: &str = "relaycord";
const AUDIENCE: &str = "minecraft-client";

/// A name-only credential only has to outlive the verification round
/// trip; a verified one lasts a play session.
fn lifetime(account: Option<AccountId>) -> Duration {
    match account {
        Some(_) => Duration::days(1),
        None => Duration::minutes(5),
    }
}

/// Which of the two credential classes a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Name only; good solely for completing verification.
    Unverified,
    /// Name and account id; accepted by the chat socket.
    Verified,
}

/// The signed body of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    /// Display name the credential was issued for.
    pub name: String,
    /// Account id, present only on verified credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<AccountId>,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    pub fn kind(&self) -> CredentialKind {
        match self.uuid {
            Some(_) => CredentialKind::Verified,
            None => CredentialKind::Unverified,
        }
    }

    /// The identity a verified credential asserts.
    pub fn identity(&self) -> Option<Identity> {
        self.uuid.map(|account| Identity {
            account,
            name: self.name.clone(),
        })
    }
}

/// A freshly issued credential, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks credentials with one HMAC key.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    /// Issues a credential for `name`. With an account id the credential
    /// is verified and lives a day; without one it lives five minutes.
    pub fn issue(
        &self,
        name: &str,
        account: Option<AccountId>,
    ) -> Result<IssuedCredential, AuthError> {
        self.issue_at(name, account, Utc::now())
    }

    /// [`issue`](Self::issue) as of a fixed instant.
    pub fn issue_at(
        &self,
        name: &str,
        account: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredential, AuthError> {
        let now = now.trunc_subsecs(0);
        let expires_at = now + lifetime(account);
        let claims = Claims {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            name: name.to_string(),
            uuid: account,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| {
                tracing::warn!(error = %e, "unable to sign credential");
                AuthError::Signing
            })?;

        Ok(IssuedCredential { token, expires_at })
    }

    /// Checks a token's signature, issuer, audience, and expiry and
    /// returns its claims.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] naming the first check that failed.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation(true))
            .map(|data| data.claims)
            .map_err(rejection)
    }

    /// [`decode`](Self::decode) as of a fixed instant.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation(false))
            .map(|data| data.claims)
            .map_err(rejection)?;
        if claims.exp <= now.timestamp() {
            return Err(AuthError::InvalidToken("expired"));
        }
        Ok(claims)
    }
}

/// HS256 only, exact issuer and audience, no leeway on expiry. With
/// `check_exp` off the caller compares `exp` against its own clock.
fn validation(check_exp: bool) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.leeway = 0;
    validation.validate_exp = check_exp;
    validation
}

fn rejection(e: JwtError) -> AuthError {
    AuthError::InvalidToken(match e.kind() {
        ErrorKind::InvalidSignature => "bad signature",
        ErrorKind::ExpiredSignature => "expired",
        ErrorKind::InvalidIssuer => "wrong issuer",
        ErrorKind::InvalidAudience => "wrong audience",
        ErrorKind::InvalidAlgorithm => "unsupported algorithm",
        _ => "malformed",
    })
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

/// The chat socket only admits verified credentials.
impl Authenticator for TokenSigner {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        let claims = self
            .decode(token)
            .map_err(|e| SessionError::AuthFailed(e.to_string()))?;
        claims
            .identity()
            .ok_or_else(|| SessionError::AuthFailed("credential is not verified".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret")
    }

    fn account() -> AccountId {
        AccountId(Uuid::from_u128(0xabc))
    }

    #[test]
    fn test_issue_unverified_expires_in_five_minutes() {
        let now = Utc::now().trunc_subsecs(0);

        let issued = signer().issue_at("Steve", None, now).unwrap();

        assert_eq!(issued.expires_at, now + Duration::minutes(5));
        let claims = signer().decode_at(&issued.token, now).unwrap();
        assert_eq!(claims.kind(), CredentialKind::Unverified);
        assert_eq!(claims.name, "Steve");
        assert_eq!(claims.identity(), None);
    }

    #[test]
    fn test_issue_verified_carries_account_for_a_day() {
        let now = Utc::now().trunc_subsecs(0);

        let issued = signer().issue_at("Steve", Some(account()), now).unwrap();

        assert_eq!(issued.expires_at, now + Duration::days(1));
        let claims = signer().decode_at(&issued.token, now).unwrap();
        assert_eq!(claims.kind(), CredentialKind::Verified);
        assert_eq!(
            claims.identity(),
            Some(Identity {
                account: account(),
                name: "Steve".into()
            })
        );
        assert_eq!(claims.iss, "relaycord");
        assert_eq!(claims.aud, "minecraft-client");
    }

    #[test]
    fn test_decode_after_expiry_is_rejected() {
        let issued_at = Utc::now() - Duration::minutes(10);
        let issued = signer().issue_at("Steve", None, issued_at).unwrap();

        let err = signer().decode(&issued.token).unwrap_err();

        assert!(matches!(err, AuthError::InvalidToken("expired")));
    }

    #[test]
    fn test_decode_with_other_key_is_rejected() {
        let issued = signer().issue("Steve", Some(account())).unwrap();

        let err = TokenSigner::new("other").decode(&issued.token).unwrap_err();

        assert!(matches!(err, AuthError::InvalidToken("bad signature")));
    }

    #[test]
    fn test_decode_tampered_claims_is_rejected() {
        let genuine = signer().issue("Steve", None).unwrap();
        let forged = TokenSigner::new("other")
            .issue("Steve", Some(account()))
            .unwrap();
        let (forged_body, _) = forged.token.rsplit_once('.').unwrap();
        let (_, genuine_signature) = genuine.token.rsplit_once('.').unwrap();
        let spliced = format!("{forged_body}.{genuine_signature}");

        assert!(matches!(
            signer().decode(&spliced),
            Err(AuthError::InvalidToken("bad signature"))
        ));
    }

    #[test]
    fn test_decode_at_past_expiry_is_rejected() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let issued = signer().issue_at("Steve", None, now).unwrap();

        assert!(signer().decode_at(&issued.token, now + Duration::minutes(4)).is_ok());
        assert!(matches!(
            signer().decode_at(&issued.token, issued.expires_at),
            Err(AuthError::InvalidToken("expired"))
        ));
    }

    #[test]
    fn test_decode_foreign_audience_is_rejected() {
        let now = Utc::now().trunc_subsecs(0);
        let claims = Claims {
            iss: ISSUER.into(),
            aud: "someone-else".into(),
            name: "Steve".into(),
            uuid: Some(account()),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            signer().decode(&token),
            Err(AuthError::InvalidToken("wrong audience"))
        ));
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(signer().decode(token), Err(AuthError::InvalidToken(_))),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_issued_credential_serializes_camel_case() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let issued = signer().issue_at("Steve", None, now).unwrap();

        let json = serde_json::to_value(&issued).unwrap();

        assert_eq!(json["token"], issued.token.as_str());
        assert_eq!(json["expiresAt"], "2023-11-14T22:18:20Z");
    }

    #[tokio::test]
    async fn test_authenticate_verified_yields_identity() {
        let issued = signer().issue("Steve", Some(account())).unwrap();

        let identity = signer().authenticate(&issued.token).await.unwrap();

        assert_eq!(identity.account, account());
        assert_eq!(identity.name, "Steve");
    }

    #[tokio::test]
    async fn test_authenticate_unverified_is_refused() {
        let issued = signer().issue("Steve", None).unwrap();

        let err = signer().authenticate(&issued.token).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthFailed(_)));
    }
}
