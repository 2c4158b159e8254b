//! Delivery to the chat platform.

use std::future::Future;

use relaycord_protocol::ChannelId;
use serde_json::json;

/// Posts text into chat-platform channels.
pub trait ChatPlatform: Send + Sync + 'static {
    fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The platform could not be reached.
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with a non-success status.
    #[error("platform rejected message to channel {channel}: HTTP {status}")]
    Rejected { channel: ChannelId, status: u16 },
}

/// [`ChatPlatform`] backed by Discord's REST API.
#[derive(Clone)]
pub struct DiscordRest {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordRest {
    pub const DEFAULT_API_BASE: &'static str = "https://discord.com/api/v10";

    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl ChatPlatform for DiscordRest {
    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<(), PlatformError> {
        let response = self
            .client
            .post(format!("{}/channels/{channel}/messages", self.api_base))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Rejected {
                channel,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
