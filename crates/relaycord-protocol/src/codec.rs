//! Codec trait and the chat socket frame decoder.
//!
//! The protocol layer doesn't care how messages are serialized; it only
//! needs something that implements [`Codec`]. The chat socket speaks JSON,
//! so [`JsonCodec`] is the one in use.

use relaycord_transport::Frame;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{ChatMessage, MessageType, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` so a codec can live inside long-running
/// connection tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use relaycord_protocol::{ChatMessage, Codec, JsonCodec};
///
/// let bytes = JsonCodec.encode(&ChatMessage::ack()).unwrap();
/// assert_eq!(bytes, br#"{"type":1,"args":[]}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// The `{type, args}` shape before the type code is checked.
///
/// Decoding the code as a plain integer first lets an unknown type be
/// reported as unsupported instead of as a generic parse failure.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: i64,
    #[serde(default)]
    args: Vec<String>,
}

/// Decodes one inbound frame into a [`ChatMessage`].
///
/// Binary frames are rejected without being parsed. Argument counts are
/// not checked here; see [`ChatMessage::into_request`].
///
/// # Errors
/// - [`ProtocolError::NonText`] for a binary frame
/// - `ProtocolError::Decode` if the text is not a `{type, args}` object
/// - [`ProtocolError::UnsupportedType`] for an unknown type code
pub fn decode_frame<C: Codec>(
    codec: &C,
    frame: Frame,
) -> Result<ChatMessage, ProtocolError> {
    let text = match frame {
        Frame::Text(text) => text,
        Frame::Binary(_) => return Err(ProtocolError::NonText),
    };
    let raw: RawMessage = codec.decode(text.as_bytes())?;
    let kind = MessageType::try_from(raw.kind)?;
    Ok(ChatMessage::new(kind, raw.args))
}

/// Encodes an outbound message as the text of one frame.
///
/// # Errors
/// Returns `ProtocolError::Encode` if serialization fails, or
/// [`ProtocolError::NonText`] if the codec produced non-UTF-8 output.
pub fn encode_frame<C: Codec>(
    codec: &C,
    message: &ChatMessage,
) -> Result<String, ProtocolError> {
    let bytes = codec.encode(message)?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::NonText)
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::ClientRequest;

    fn text(s: &str) -> Frame {
        Frame::Text(s.to_string())
    }

    #[test]
    fn test_decode_frame_join_message() {
        let msg = decode_frame(&JsonCodec, text(r#"{"type":2,"args":["1.2.3.4:25565"]}"#))
            .expect("should decode");
        assert_eq!(msg.kind, MessageType::Join);
        assert_eq!(msg.args, vec!["1.2.3.4:25565".to_string()]);
    }

    #[test]
    fn test_decode_frame_missing_args_defaults_to_empty() {
        let msg = decode_frame(&JsonCodec, text(r#"{"type":3}"#)).expect("should decode");
        assert_eq!(msg.into_request().unwrap(), ClientRequest::Leave);
    }

    #[test]
    fn test_decode_frame_binary_is_non_text() {
        let err = decode_frame(&JsonCodec, Frame::Binary(b"{}".to_vec())).unwrap_err();
        assert!(matches!(err, ProtocolError::NonText));
        assert_eq!(err.to_string(), "Only text messages are allowed");
    }

    #[test]
    fn test_decode_frame_malformed_json_is_decode_error() {
        let err = decode_frame(&JsonCodec, text("not json")).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert_eq!(err.to_string(), "Failed to deserialize message");
    }

    #[test]
    fn test_decode_frame_wrong_arg_shape_is_decode_error() {
        let err = decode_frame(&JsonCodec, text(r#"{"type":4,"args":[1,2]}"#)).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_frame_unknown_type_is_unsupported() {
        let err = decode_frame(&JsonCodec, text(r#"{"type":9,"args":[]}"#)).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(9)));
        assert_eq!(err.to_string(), "Specified type not supported");
    }

    #[test]
    fn test_encode_frame_local_reply_includes_replying_to() {
        let msg = ChatMessage::local("Steve", "hi", Some("Alex".into()));
        let text = encode_frame(&JsonCodec, &msg).unwrap();
        assert_eq!(text, r#"{"type":5,"args":["Steve","hi","Alex"]}"#);
    }

    #[test]
    fn test_encode_frame_error_reply() {
        let text = encode_frame(&JsonCodec, &ChatMessage::error("Join a server first")).unwrap();
        assert_eq!(text, r#"{"type":0,"args":["Join a server first"]}"#);
    }
}
