//! Wire protocol for Relaycord.
//!
//! This crate defines what game clients and the relay say to each other
//! over the chat socket:
//!
//! - **Types** ([`ChatMessage`], [`MessageType`], [`ClientRequest`]) and
//!   the identity newtypes shared by every layer ([`AccountId`],
//!   [`ChannelId`], [`ServerAddress`], [`Identity`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`decode_frame`], [`encode_frame`]).
//! - **Errors** ([`ProtocolError`]), whose text is sent back to clients.
//!
//! ```text
//! Transport (Frame) → Protocol (ChatMessage → ClientRequest) → Router
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, decode_frame, encode_frame};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AccountId, ChannelId, ChatMessage, ClientRequest, Identity, MessageType,
    ServerAddress,
};
