//! Integration tests for the WebSocket chat socket.
//!
//! These spin up a real listener and a `tokio-tungstenite` client to
//! verify the upgrade rules (path and bearer credential), that accepting
//! never waits on a peer's handshake, and that text and binary frames
//! arrive as the right [`Frame`] variants.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use relaycord_transport::{
        CHAT_SOCKET_PATH, Connection, Frame, Transport, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on an OS-assigned port and returns the transport and address.
    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    /// Accepts one peer and completes its upgrade.
    async fn accept_one(
        transport: &mut WebSocketTransport,
    ) -> Result<relaycord_transport::WebSocketConnection, relaycord_transport::TransportError> {
        let pending = transport.accept().await?;
        WebSocketTransport::upgrade(pending).await
    }

    async fn connect_client(
        addr: &str,
        path: &str,
        token: Option<&str>,
    ) -> Result<ClientWs, tokio_tungstenite::tungstenite::Error> {
        let mut request = format!("ws://{addr}{path}")
            .into_client_request()
            .expect("valid request");
        if let Some(token) = token {
            request.headers_mut().insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .expect("valid header"),
            );
        }
        tokio_tungstenite::connect_async(request)
            .await
            .map(|(ws, _)| ws)
    }

    #[tokio::test]
    async fn test_websocket_accept_captures_credential_and_moves_frames() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            accept_one(&mut transport).await.expect("should accept")
        });

        let mut client = connect_client(&addr, CHAT_SOCKET_PATH, Some("abc"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("task should complete");

        assert!(conn.id().into_inner() > 0);
        assert_eq!(conn.credential(), Some("abc"));

        // Server sends text, client receives it.
        conn.send_text(r#"{"type":1,"args":[]}"#)
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":1,"args":[]}"#);

        // Client sends text, then binary.
        client.send(Message::text("hello")).await.unwrap();
        client
            .send(Message::Binary(b"raw".to_vec().into()))
            .await
            .unwrap();

        let first = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(first, Frame::Text("hello".into()));
        let second = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(second, Frame::Binary(b"raw".to_vec()));

        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            accept_one(&mut transport).await.expect("should accept")
        });

        let mut client = connect_client(&addr, CHAT_SOCKET_PATH, Some("t"))
            .await
            .expect("client should connect");
        let conn = server.await.unwrap();

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_accept_without_bearer_is_refused() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move { accept_one(&mut transport).await });

        let client = connect_client(&addr, CHAT_SOCKET_PATH, None).await;
        assert!(client.is_err(), "upgrade should be refused");

        let accepted = server.await.unwrap();
        assert!(accepted.is_err(), "transport should report the refusal");
    }

    #[tokio::test]
    async fn test_websocket_accept_wrong_path_is_refused() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move { accept_one(&mut transport).await });

        let client = connect_client(&addr, "/other", Some("abc")).await;
        assert!(client.is_err(), "upgrade should be refused");
        assert!(server.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_websocket_accept_does_not_wait_for_idle_peer() {
        let (mut transport, addr) = bind().await;

        // A peer that connects and never sends its upgrade request.
        let _idle = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let idle = tokio::time::timeout(Duration::from_secs(1), transport.accept())
            .await
            .expect("accept should not wait on the handshake")
            .expect("should accept");
        let idle_upgrade = tokio::spawn(WebSocketTransport::upgrade(idle));

        let server = tokio::spawn(async move { accept_one(&mut transport).await });
        let _client = tokio::time::timeout(
            Duration::from_secs(2),
            connect_client(&addr, CHAT_SOCKET_PATH, Some("abc")),
        )
        .await
        .expect("second peer should not be stalled")
        .expect("client should connect");

        let conn = server.await.unwrap().expect("should upgrade");
        assert_eq!(conn.credential(), Some("abc"));
        assert!(!idle_upgrade.is_finished(), "idle peer is still pending");
        idle_upgrade.abort();
    }
}
