//! HTTP endpoints of the auth handshake.
//!
//! | route               | input                          | success              |
//! |---------------------|--------------------------------|----------------------|
//! | `POST /auth/begin`  | form field `username`          | unverified credential |
//! | `POST /auth/verify` | `Authorization: Bearer <unverified>` | verified credential |
//!
//! Both answer `{"token", "expiresAt"}`. Failures map to `400` (no
//! username), `401` (missing or invalid bearer), `403` (the session
//! service did not vouch), `502` (session service unreachable).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use relaycord_auth::{AuthError, Handshake, IssuedCredential, SessionVerifier};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct BeginRequest {
    #[serde(default)]
    username: String,
}

/// Routes for the handshake, ready to be served or nested.
pub fn auth_router<V: SessionVerifier>(handshake: Arc<Handshake<V>>) -> Router {
    Router::new()
        .route("/auth/begin", post(begin_handler::<V>))
        .route("/auth/verify", post(verify_handler::<V>))
        .with_state(handshake)
}

async fn begin_handler<V: SessionVerifier>(
    State(handshake): State<Arc<Handshake<V>>>,
    Form(BeginRequest { username }): Form<BeginRequest>,
) -> Result<Json<IssuedCredential>, ApiError> {
    let issued = handshake.begin(&username)?;
    tracing::debug!(name = %username, "handshake begun");
    Ok(Json(issued))
}

async fn verify_handler<V: SessionVerifier>(
    State(handshake): State<Arc<Handshake<V>>>,
    headers: HeaderMap,
) -> Result<Json<IssuedCredential>, ApiError> {
    let token = bearer(&headers).ok_or(AuthError::InvalidToken("missing bearer"))?;
    Ok(Json(handshake.verify(token).await?))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// An [`AuthError`] on its way out as an HTTP response.
struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AuthError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
            AuthError::Signing => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "auth request failed");
        } else {
            tracing::debug!(error = %self.0, "auth request refused");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
