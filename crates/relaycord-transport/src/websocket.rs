//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Game clients open the chat socket at [`CHAT_SOCKET_PATH`] and present
//! their credential in an `Authorization: Bearer <token>` header on the
//! upgrade request. Upgrades to any other path, or without a bearer
//! credential, are refused during the HTTP handshake. Whether the
//! credential is *valid* is decided later by the session layer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{StatusCode, header};

use crate::{Connection, ConnectionId, Frame, Transport, TransportError};

/// Request path of the chat socket.
pub const CHAT_SOCKET_PATH: &str = "/chat/ws";

/// Upper bound on the HTTP upgrade of a freshly accepted TCP stream.
const UPGRADE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP connection whose WebSocket upgrade has not run yet.
///
/// Returned by [`WebSocketTransport::accept`] so the accept loop never
/// waits on a peer's HTTP request; the upgrade runs wherever the caller
/// hands it off to.
pub struct PendingUpgrade {
    stream: TcpStream,
    peer: SocketAddr,
}

impl PendingUpgrade {
    /// Address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingUpgrade;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingUpgrade { stream, peer })
    }

    async fn upgrade(pending: Self::Pending) -> Result<Self::Connection, Self::Error> {
        let PendingUpgrade { stream, peer } = pending;

        let mut credential = None;
        let callback = |req: &Request, resp: Response| {
            if req.uri().path() != CHAT_SOCKET_PATH {
                return Err(reject(StatusCode::NOT_FOUND, "unknown path"));
            }
            match bearer_token(req) {
                Some(token) => {
                    credential = Some(token);
                    Ok(resp)
                }
                None => Err(reject(
                    StatusCode::UNAUTHORIZED,
                    "missing bearer credential",
                )),
            }
        };

        let ws = tokio::time::timeout(
            UPGRADE_TIMEOUT,
            tokio_tungstenite::accept_hdr_async(stream, callback),
        )
        .await
        .map_err(|_| {
            TransportError::AcceptFailed(TransportError::io(
                std::io::ErrorKind::TimedOut,
                "websocket upgrade timed out",
            ))
        })?
        .map_err(|e| {
            TransportError::AcceptFailed(TransportError::io(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "accepted chat socket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            credential,
            sink: Arc::new(Mutex::new(sink)),
            stream: Arc::new(Mutex::new(stream)),
        })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_string()));
    *resp.status_mut() = status;
    resp
}

/// A single WebSocket connection.
///
/// The socket is split so a pending `recv` never blocks an outbound send;
/// each half has its own lock, and the sink lock serializes concurrent
/// senders so frames are never interleaved.
pub struct WebSocketConnection {
    id: ConnectionId,
    credential: Option<String>,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    stream: Arc<Mutex<SplitStream<WsStream>>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::text(text.to_owned()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(TransportError::io(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        TransportError::io(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(TransportError::io(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}
