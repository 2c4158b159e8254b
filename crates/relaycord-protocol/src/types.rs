//! Core protocol types for the chat socket wire format.
//!
//! Every frame on the chat socket is one JSON object:
//!
//! ```text
//! {"type": <int 0..5>, "args": ["...", ...]}
//! ```
//!
//! | type | name   | direction        | args                                  |
//! |------|--------|------------------|---------------------------------------|
//! | 0    | Error  | server → client  | error text                            |
//! | 1    | Ack    | server → client  | none                                  |
//! | 2    | Join   | client → server  | server address `a.b.c.d:port`         |
//! | 3    | Leave  | client → server  | none                                  |
//! | 4    | Global | client → server  | raw chat line                         |
//! | 5    | Local  | both             | client: text; server: name, text, [replying to] |

use std::fmt;
use std::net::SocketAddrV4;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable game-account identifier, as issued by the session service.
///
/// The session service reports ids in the dash-less "simple" form;
/// `Uuid` parses both that and the hyphenated form, so two spellings of
/// the same id compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A chat-platform text channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a verified connection belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable account id.
    pub account: AccountId,
    /// In-game display name.
    pub name: String,
}

/// A game server address in canonical `a.b.c.d:port` form.
///
/// Serialized as that string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress(SocketAddrV4);

impl ServerAddress {
    /// Wraps an already-resolved socket address.
    pub fn new(addr: SocketAddrV4) -> Self {
        Self(addr)
    }

    /// The underlying socket address.
    pub fn socket_addr(&self) -> SocketAddrV4 {
        self.0
    }
}

impl FromStr for ServerAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddrV4>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidAddress(s.to_string()))
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerAddress> for String {
    fn from(value: ServerAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The numeric `type` field of a chat socket frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
#[repr(u8)]
pub enum MessageType {
    /// Server → client: the last message was rejected.
    Error = 0,
    /// Server → client: the last message was handled.
    Ack = 1,
    /// Client → server: the player joined a game server.
    Join = 2,
    /// Client → server: the player left their game server.
    Leave = 3,
    /// Client → server: a line of the game server's public chat.
    Global = 4,
    /// Either direction: chat that only exists between game and platform.
    Local = 5,
}

impl MessageType {
    /// Number of arguments a client must send with this type.
    ///
    /// `None` for server-to-client types, which clients may not send.
    pub fn client_arity(self) -> Option<usize> {
        match self {
            Self::Error | Self::Ack => None,
            Self::Join | Self::Global | Self::Local => Some(1),
            Self::Leave => Some(0),
        }
    }

    fn from_code(value: i64) -> Result<Self, ProtocolError> {
        Ok(match value {
            0 => Self::Error,
            1 => Self::Ack,
            2 => Self::Join,
            3 => Self::Leave,
            4 => Self::Global,
            5 => Self::Local,
            other => return Err(ProtocolError::UnsupportedType(other)),
        })
    }
}

impl TryFrom<i64> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: i64) -> Result<Self, ProtocolError> {
        Self::from_code(value)
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value as u8
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// One frame on the chat socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// String arguments; meaning depends on `kind`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ChatMessage {
    /// Creates a message of the given type.
    pub fn new(kind: MessageType, args: Vec<String>) -> Self {
        Self { kind, args }
    }

    /// Server → client rejection carrying a human-readable reason.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::new(MessageType::Error, vec![reason.into()])
    }

    /// Server → client acknowledgement.
    pub fn ack() -> Self {
        Self::new(MessageType::Ack, Vec::new())
    }

    /// Server → client local chat line relayed from the chat platform.
    pub fn local(
        name: impl Into<String>,
        message: impl Into<String>,
        replying_to: Option<String>,
    ) -> Self {
        let mut args = vec![name.into(), message.into()];
        args.extend(replying_to);
        Self::new(MessageType::Local, args)
    }

    /// Validates a client-sent message and converts it into a request.
    ///
    /// # Errors
    /// - [`ProtocolError::UnsupportedType`] for server-to-client types
    /// - [`ProtocolError::MissingArguments`] /
    ///   [`ProtocolError::TooManyArguments`] on an arity mismatch
    pub fn into_request(self) -> Result<ClientRequest, ProtocolError> {
        let expected = self
            .kind
            .client_arity()
            .ok_or(ProtocolError::UnsupportedType(u8::from(self.kind).into()))?;
        let got = self.args.len();
        if got < expected {
            return Err(ProtocolError::MissingArguments {
                kind: self.kind,
                expected,
                got,
            });
        }
        if got > expected {
            return Err(ProtocolError::TooManyArguments {
                kind: self.kind,
                expected,
                got,
            });
        }

        let mut args = self.args.into_iter();
        let mut first = || args.next().unwrap_or_default();
        Ok(match self.kind {
            MessageType::Join => ClientRequest::Join { address: first() },
            MessageType::Leave => ClientRequest::Leave,
            MessageType::Global => ClientRequest::Global { line: first() },
            MessageType::Local => ClientRequest::Local { text: first() },
            MessageType::Error | MessageType::Ack => {
                return Err(ProtocolError::UnsupportedType(
                    u8::from(self.kind).into(),
                ));
            }
        })
    }
}

/// A structurally valid client → server message.
///
/// Whether it is valid *now* depends on the session's affiliation; that
/// is decided by the relay router, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Announce joining a game server. The address is unparsed.
    Join { address: String },
    /// Announce leaving the current game server.
    Leave,
    /// A raw line of the game server's public chat.
    Global { line: String },
    /// A local chat message for the bound channels.
    Local { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_serializes_as_integer() {
        let json = serde_json::to_string(&ChatMessage::ack()).unwrap();
        assert_eq!(json, r#"{"type":1,"args":[]}"#);
    }

    #[test]
    fn test_message_type_try_from_unknown_is_unsupported() {
        assert!(matches!(
            MessageType::try_from(9),
            Err(ProtocolError::UnsupportedType(9))
        ));
        assert!(matches!(
            MessageType::try_from(-1),
            Err(ProtocolError::UnsupportedType(-1))
        ));
    }

    #[test]
    fn test_error_message_matches_wire_shape() {
        let json =
            serde_json::to_string(&ChatMessage::error("Invalid IP:Port specified"))
                .unwrap();
        assert_eq!(json, r#"{"type":0,"args":["Invalid IP:Port specified"]}"#);
    }

    #[test]
    fn test_local_without_reply_has_two_args() {
        let msg = ChatMessage::local("Steve", "hi", None);
        assert_eq!(msg.kind, MessageType::Local);
        assert_eq!(msg.args, vec!["Steve", "hi"]);
    }

    #[test]
    fn test_local_with_reply_has_three_args() {
        let msg = ChatMessage::local("Steve", "hi", Some("Alex".into()));
        assert_eq!(msg.args, vec!["Steve", "hi", "Alex"]);
    }

    // =====================================================================
    // into_request()
    // =====================================================================

    #[test]
    fn test_into_request_join_with_address() {
        let msg =
            ChatMessage::new(MessageType::Join, vec!["1.2.3.4:25565".into()]);
        assert_eq!(
            msg.into_request().unwrap(),
            ClientRequest::Join {
                address: "1.2.3.4:25565".into()
            }
        );
    }

    #[test]
    fn test_into_request_leave_without_args() {
        let msg = ChatMessage::new(MessageType::Leave, vec![]);
        assert_eq!(msg.into_request().unwrap(), ClientRequest::Leave);
    }

    #[test]
    fn test_into_request_join_without_args_is_missing() {
        let msg = ChatMessage::new(MessageType::Join, vec![]);
        let err = msg.into_request().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingArguments {
                kind: MessageType::Join,
                expected: 1,
                got: 0
            }
        ));
        assert_eq!(err.to_string(), "Missing required arguments");
    }

    #[test]
    fn test_into_request_global_with_two_args_is_too_many() {
        let msg = ChatMessage::new(
            MessageType::Global,
            vec!["a".into(), "b".into()],
        );
        assert!(matches!(
            msg.into_request(),
            Err(ProtocolError::TooManyArguments { got: 2, .. })
        ));
    }

    #[test]
    fn test_into_request_server_only_type_is_unsupported() {
        for kind in [MessageType::Error, MessageType::Ack] {
            let msg = ChatMessage::new(kind, vec![]);
            assert!(matches!(
                msg.into_request(),
                Err(ProtocolError::UnsupportedType(_))
            ));
        }
    }

    // =====================================================================
    // ServerAddress
    // =====================================================================

    #[test]
    fn test_server_address_parses_ip_and_port() {
        let addr: ServerAddress = "1.2.3.4:25565".parse().unwrap();
        assert_eq!(addr.to_string(), "1.2.3.4:25565");
    }

    #[test]
    fn test_server_address_rejects_garbage() {
        for bad in [
            "not-an-address",
            "1.2.3.4",
            "1.2.3:25565",
            "256.1.1.1:25565",
            "1.2.3.4:70000",
            "example.com:25565",
        ] {
            let err = bad.parse::<ServerAddress>().unwrap_err();
            assert_eq!(err.to_string(), "Invalid IP:Port specified", "{bad}");
        }
    }

    #[test]
    fn test_server_address_serde_uses_string_form() {
        let addr: ServerAddress = "10.0.0.1:25566".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, r#""10.0.0.1:25566""#);
        let back: ServerAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_account_id_accepts_simple_and_hyphenated_forms() {
        let simple: AccountId =
            "069a79f444e94726a5befca90e38aaf5".parse().unwrap();
        let hyphenated: AccountId =
            "069a79f4-44e9-4726-a5be-fca90e38aaf5".parse().unwrap();
        assert_eq!(simple, hyphenated);
    }
}
