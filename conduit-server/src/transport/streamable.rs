//! Streamable HTTP transport
//!
//! Everything happens on one path. An `initialize` POST without a session
//! header opens a session and returns its id in `Mcp-Session-Id`; later
//! requests carry that header and are answered in the POST reply. A `GET`
//! attaches the session's server-to-client stream, and `DELETE` closes it.
//!
//! The receiving half of a session's channel waits in [`ParkedStreams`]
//! until the client attaches. Each parked entry has a watcher that drops it
//! when its session closes, and closes the session as disconnected if no
//! `GET` arrives within the attach deadline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use conduit_core::jsonrpc::{INTERNAL_ERROR, INVALID_REQUEST};
use conduit_core::{
    CloseReason, Frame, JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcResponse, SessionId,
    SessionLifecycleManager,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{StreamTransport, TransportKind, sse_stream};
use crate::AppState;

pub const MCP_PATH: &str = "/mcp";
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Single-endpoint transport (protocol 2025-03-26)
#[derive(Debug, Clone, Default)]
pub struct StreamableHttpTransport {
    parked: Arc<ParkedStreams>,
}

impl StreamableHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamTransport for StreamableHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::StreamableHttp
    }

    fn routes(&self) -> Router<Arc<AppState>> {
        Router::new()
            .route(
                MCP_PATH,
                post(post_mcp).get(attach_stream).delete(delete_session),
            )
            .layer(Extension(Arc::clone(&self.parked)))
    }
}

/// Stream receivers waiting for their client's `GET`
#[derive(Debug, Default)]
struct ParkedStreams {
    inner: Mutex<HashMap<SessionId, mpsc::Receiver<Frame>>>,
}

impl ParkedStreams {
    fn park(&self, id: SessionId, rx: mpsc::Receiver<Frame>) {
        self.lock().insert(id, rx);
    }

    fn take(&self, id: &SessionId) -> Option<mpsc::Receiver<Frame>> {
        self.lock().remove(id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, mpsc::Receiver<Frame>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn session_header(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(SessionId::from)
}

fn rpc_error(status: StatusCode, code: i64, message: &str) -> Response {
    let body = JsonRpcResponse::err(JsonRpcId::Null, JsonRpcError::new(code, message));
    (status, Json(body)).into_response()
}

fn session_not_found() -> Response {
    rpc_error(StatusCode::NOT_FOUND, INVALID_REQUEST, "Session not found")
}

async fn post_mcp(
    State(state): State<Arc<AppState>>,
    Extension(parked): Extension<Arc<ParkedStreams>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message = match JsonRpcMessage::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!("Rejecting malformed message: {}", e);
            return rpc_error(StatusCode::BAD_REQUEST, e.code(), &e.to_string());
        }
    };

    match session_header(&headers) {
        Some(id) => post_to_session(&state, id, message).await,
        None => initialize_session(&state, &parked, message).await,
    }
}

async fn initialize_session(
    state: &AppState,
    parked: &Arc<ParkedStreams>,
    message: JsonRpcMessage,
) -> Response {
    if message.method() != Some("initialize") || !message.is_request() {
        return rpc_error(
            StatusCode::BAD_REQUEST,
            INVALID_REQUEST,
            "Bad Request: No valid session ID provided",
        );
    }

    let (tx, rx) = mpsc::channel(state.channel_capacity);
    let (id, closed) = match state
        .lifecycle
        .create_session_with_notify(TransportKind::StreamableHttp.as_str(), tx)
        .await
    {
        Ok(opened) => opened,
        Err(e) => {
            error!("Failed to open streamable session: {}", e);
            return rpc_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR,
                "Failed to open session",
            );
        }
    };
    parked.park(id.clone(), rx);
    watch_parked(
        Arc::clone(parked),
        Arc::clone(&state.lifecycle),
        id.clone(),
        closed,
        state.attach_timeout,
    );
    info!(session_id = %id, "Streamable HTTP session initialized");

    let Ok(session) = state.router.resolve(&id).await else {
        return session_not_found();
    };
    let Some(response) = state.router.dispatch(&session, message).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut reply = Json(response).into_response();
    match HeaderValue::from_str(id.as_str()) {
        Ok(value) => {
            reply.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        Err(e) => error!(session_id = %id, "Session id is not a valid header value: {}", e),
    }
    reply
}

/// Release a parked receiver once it can no longer be attached
///
/// A close from any path drops the entry. If the deadline passes with the
/// receiver still parked, the client never attached and the session is
/// closed as disconnected.
fn watch_parked(
    parked: Arc<ParkedStreams>,
    lifecycle: Arc<SessionLifecycleManager>,
    id: SessionId,
    closed: oneshot::Receiver<CloseReason>,
    deadline: std::time::Duration,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = closed => {
                parked.take(&id);
            }
            _ = tokio::time::sleep(deadline) => {
                if parked.take(&id).is_some() {
                    info!(session_id = %id, "No stream attached before deadline");
                    lifecycle.close_session(&id, CloseReason::Disconnected).await;
                }
            }
        }
    });
}

async fn post_to_session(state: &AppState, id: SessionId, message: JsonRpcMessage) -> Response {
    let Ok(session) = state.router.resolve(&id).await else {
        return session_not_found();
    };

    match state.router.dispatch(&session, message).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn attach_stream(
    State(state): State<Arc<AppState>>,
    Extension(parked): Extension<Arc<ParkedStreams>>,
    headers: HeaderMap,
) -> Response {
    let Some(id) = session_header(&headers) else {
        return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
    };

    let rx = parked.take(&id);
    if !state.lifecycle.contains(&id).await {
        return session_not_found();
    }

    match rx {
        Some(rx) => {
            info!(session_id = %id, "Stream attached");
            sse_stream(rx, state.keep_alive).into_response()
        }
        None => (StatusCode::CONFLICT, "Stream already attached").into_response(),
    }
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(parked): Extension<Arc<ParkedStreams>>,
    headers: HeaderMap,
) -> Response {
    let Some(id) = session_header(&headers) else {
        return (StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header").into_response();
    };

    state
        .lifecycle
        .close_session(&id, CloseReason::Explicit)
        .await;
    parked.take(&id);
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::create_router;
    use axum::http::HeaderName;
    use axum_test::TestServer;
    use conduit_core::protocol::ServerInfo;
    use conduit_core::jsonrpc::PARSE_ERROR;
    use conduit_core::{HandlerSet, SequentialIdGenerator, SessionEvent, SessionRegistry};
    use serde_json::{Value, json};
    use std::time::Duration;

    fn create_test_state() -> Arc<AppState> {
        let lifecycle = Arc::new(SessionLifecycleManager::with_id_generator(
            Arc::new(SessionRegistry::new()),
            Arc::new(SequentialIdGenerator::default()),
        ));
        let handlers = Arc::new(HandlerSet::builder(ServerInfo::new("test", "0.0.0")).build());
        Arc::new(
            AppState::with_components(lifecycle, handlers)
                .with_transport(TransportKind::StreamableHttp),
        )
    }

    fn create_test_server(state: &Arc<AppState>) -> TestServer {
        let transport = StreamableHttpTransport::new();
        TestServer::new(create_router(Arc::clone(state), &transport)).unwrap()
    }

    fn session_header_name() -> HeaderName {
        HeaderName::from_static(SESSION_ID_HEADER)
    }

    fn initialize() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {"protocolVersion": "2025-03-26", "capabilities": {}}
        })
    }

    // ==================== Parked Stream Tests ====================

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 1s");
    }

    #[tokio::test]
    async fn closing_session_releases_parked_stream() {
        let state = create_test_state();
        let transport = StreamableHttpTransport::new();
        let server = TestServer::new(create_router(Arc::clone(&state), &transport)).unwrap();
        server.post(MCP_PATH).json(&initialize()).await;
        assert_eq!(transport.parked.len(), 1);

        state
            .lifecycle
            .close_session(&SessionId::from("s1"), CloseReason::Explicit)
            .await;

        let parked = Arc::clone(&transport.parked);
        wait_until(move || parked.len() == 0).await;
    }

    #[tokio::test]
    async fn unattached_session_is_closed_after_deadline() {
        let lifecycle = Arc::new(SessionLifecycleManager::with_id_generator(
            Arc::new(SessionRegistry::new()),
            Arc::new(SequentialIdGenerator::default()),
        ));
        let handlers = Arc::new(HandlerSet::builder(ServerInfo::new("test", "0.0.0")).build());
        let state = Arc::new(
            AppState::with_components(lifecycle, handlers)
                .with_transport(TransportKind::StreamableHttp)
                .with_attach_timeout(Duration::from_millis(50)),
        );
        let mut events = state.lifecycle.subscribe();
        let transport = StreamableHttpTransport::new();
        let server = TestServer::new(create_router(Arc::clone(&state), &transport)).unwrap();

        server.post(MCP_PATH).json(&initialize()).await.assert_status_ok();

        let opened = events.recv().await.unwrap();
        assert_eq!(opened, SessionEvent::Opened { id: SessionId::from("s1") });
        let closed = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            closed,
            SessionEvent::Closed {
                id: SessionId::from("s1"),
                reason: CloseReason::Disconnected,
            }
        );
        assert_eq!(transport.parked.len(), 0);
        assert_eq!(state.lifecycle.session_count().await, 0);
    }

    // ==================== Request Tests ====================

    #[tokio::test]
    async fn initialize_without_header_creates_session() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let response = server.post(MCP_PATH).json(&initialize()).await;

        response.assert_status_ok();
        assert_eq!(response.header(SESSION_ID_HEADER), "s1");
        let body: Value = response.json();
        assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(body["result"]["serverInfo"]["name"], "test");
        assert!(state.lifecycle.contains(&SessionId::from("s1")).await);
    }

    #[tokio::test]
    async fn non_initialize_without_header_is_rejected() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let response = server
            .post(MCP_PATH)
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(state.lifecycle.session_count().await, 0);
    }

    #[tokio::test]
    async fn request_with_unknown_header_is_not_found() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let response = server
            .post(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("unknown"))
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn request_with_header_is_answered_inline() {
        let state = create_test_state();
        let server = create_test_server(&state);
        server.post(MCP_PATH).json(&initialize()).await;

        let response = server
            .post(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("s1"))
            .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], 2);
        assert_eq!(body["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notification_with_header_is_accepted() {
        let state = create_test_state();
        let server = create_test_server(&state);
        server.post(MCP_PATH).json(&initialize()).await;

        let response = server
            .post(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("s1"))
            .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;

        response.assert_status(StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let response = server.post(MCP_PATH).text("[oops").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn request_with_invalid_id_is_invalid_request() {
        let state = create_test_state();
        let server = create_test_server(&state);
        server.post(MCP_PATH).json(&initialize()).await;

        let response = server
            .post(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("s1"))
            .json(&json!({"jsonrpc": "2.0", "id": true, "method": "tools/list"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
    }

    // ==================== Stream and Delete Tests ====================

    #[tokio::test]
    async fn attach_unknown_session_is_not_found() {
        let state = create_test_state();
        let server = create_test_server(&state);

        let response = server
            .get(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("unknown"))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_closes_session_and_is_idempotent() {
        let state = create_test_state();
        let server = create_test_server(&state);
        server.post(MCP_PATH).json(&initialize()).await;

        let first = server
            .delete(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("s1"))
            .await;
        let second = server
            .delete(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("s1"))
            .await;

        first.assert_status(StatusCode::NO_CONTENT);
        second.assert_status(StatusCode::NO_CONTENT);
        assert_eq!(state.lifecycle.session_count().await, 0);

        let after = server
            .post(MCP_PATH)
            .add_header(session_header_name(), HeaderValue::from_static("s1"))
            .json(&json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}))
            .await;
        after.assert_status(StatusCode::NOT_FOUND);
    }
}
