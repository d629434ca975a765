//! REST API handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conduit_core::{CloseReason, SessionId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of active sessions
    pub active_sessions: usize,
    /// Transport serving client streams
    pub transport: String,
}

/// Health check endpoint
///
/// Returns server status, version, uptime, and active session count.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let active_sessions = state.lifecycle.session_count().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_sessions,
        transport: state.transport.to_string(),
    })
}

/// Summary of a live session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    pub id: String,
    /// Transport that opened the session
    pub transport: String,
    /// When the session was created (RFC 3339)
    pub created_at: String,
}

/// Response for listing sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    /// Live sessions, oldest first
    pub sessions: Vec<SessionInfo>,
}

/// List live sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let sessions = state
        .lifecycle
        .list_sessions()
        .await
        .into_iter()
        .map(|summary| SessionInfo {
            id: summary.id.to_string(),
            transport: summary.transport.to_string(),
            created_at: summary.created_at.to_rfc3339(),
        })
        .collect();

    Json(SessionListResponse { sessions })
}

/// DELETE /api/sessions/:id - Close a session
///
/// Always 204; closing an unknown session is not an error.
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    let id = SessionId::from(id);
    if state.lifecycle.close_session(&id, CloseReason::Explicit).await {
        info!(session_id = %id, "Session closed via API");
    }
    StatusCode::NO_CONTENT
}
