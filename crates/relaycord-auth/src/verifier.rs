//! The game's session service, which vouches that a player joined.

use std::future::Future;

use relaycord_protocol::AccountId;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::AuthError;

/// What the session service reports about a player who joined.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerProfile {
    pub id: AccountId,
    pub name: String,
}

/// Asks whether `name` announced a join to the server id `server_id`.
pub trait SessionVerifier: Send + Sync + 'static {
    /// # Errors
    /// - [`AuthError::Unauthorized`] if the service does not confirm the
    ///   join or answers with something other than a profile
    /// - [`AuthError::ServiceUnavailable`] if it cannot be reached
    fn has_joined(
        &self,
        name: &str,
        server_id: &str,
    ) -> impl Future<Output = Result<PlayerProfile, AuthError>> + Send;
}

/// [`SessionVerifier`] backed by the `hasJoined` endpoint.
#[derive(Debug, Clone)]
pub struct MojangSessionService {
    client: reqwest::Client,
    base_url: String,
}

impl MojangSessionService {
    pub const DEFAULT_URL: &'static str = "https://sessionserver.mojang.com";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for MojangSessionService {
    fn default() -> Self {
        Self::new(Self::DEFAULT_URL)
    }
}

impl SessionVerifier for MojangSessionService {
    async fn has_joined(&self, name: &str, server_id: &str) -> Result<PlayerProfile, AuthError> {
        let response = self
            .client
            .get(format!("{}/session/minecraft/hasJoined", self.base_url))
            .query(&[("username", name), ("serverId", server_id)])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(AuthError::ServiceUnavailable)?;

        // The service answers 204 No Content when it has no such join.
        if response.status() != StatusCode::OK {
            tracing::debug!(name, status = %response.status(), "join not confirmed");
            return Err(AuthError::Unauthorized(format!(
                "session service answered {}",
                response.status()
            )));
        }

        response
            .json::<PlayerProfile>()
            .await
            .map_err(|e| AuthError::Unauthorized(format!("unreadable profile: {e}")))
    }
}
