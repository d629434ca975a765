//! Legacy HTTP+SSE transport
//!
//! `GET /sse` opens the stream and announces the message endpoint as its
//! first frame. Clients then `POST /messages?sessionId=<id>`; responses are
//! pushed back over the stream, never in the POST reply.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use conduit_core::{Frame, JsonRpcMessage, SessionId};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{StreamTransport, TransportKind, sse_stream};
use crate::AppState;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";

/// Deprecated two-endpoint transport (protocol 2024-11-05)
#[derive(Debug, Clone, Copy, Default)]
pub struct SseTransport;

impl StreamTransport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn routes(&self) -> Router<Arc<AppState>> {
        Router::new()
            .route(SSE_PATH, get(open_stream))
            .route(MESSAGES_PATH, post(post_message))
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn open_stream(State(state): State<Arc<AppState>>) -> Response {
    let (tx, rx) = mpsc::channel(state.channel_capacity);
    let id = match state
        .lifecycle
        .create_session(TransportKind::Sse.as_str(), tx)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to open SSE session: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to open session").into_response();
        }
    };

    let endpoint = format!("{}?sessionId={}", MESSAGES_PATH, id);
    if let Some(session) = state.lifecycle.get(&id).await {
        // Nothing has been queued yet, so this only fails on an immediate close
        if let Err(e) = session.channel().write(Frame::Endpoint(endpoint)).await {
            warn!(session_id = %id, "Failed to announce endpoint: {}", e);
        }
    }

    info!(session_id = %id, "SSE stream established");
    sse_stream(rx, state.keep_alive).into_response()
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(raw_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing sessionId parameter").into_response();
    };
    let id = SessionId::from(raw_id);

    let session = match state.router.resolve(&id).await {
        Ok(session) => session,
        Err(_) => return (StatusCode::NOT_FOUND, "Session not found").into_response(),
    };

    let message = match JsonRpcMessage::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!(session_id = %id, "Rejecting malformed message: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON-RPC message: {}", e),
            )
                .into_response();
        }
    };

    if let Some(response) = state.router.dispatch(&session, message).await {
        let write = session.channel().write(response.into());
        match tokio::time::timeout(state.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(session_id = %id, "Failed to deliver response: {}", e);
                return (StatusCode::GONE, "Session stream closed").into_response();
            }
            Err(_) => {
                warn!(session_id = %id, "Session buffer full, dropping response");
                return (StatusCode::SERVICE_UNAVAILABLE, "Session stream is not draining")
                    .into_response();
            }
        }
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
