//! HTTP server module

mod api;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::transport::StreamTransport;

pub use api::{HealthResponse, SessionInfo, SessionListResponse};

/// Create the HTTP router with admin routes and the transport's routes
pub fn create_router(state: Arc<AppState>, transport: &dyn StreamTransport) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/sessions", get(api::list_sessions))
        .route("/api/sessions/:id", delete(api::close_session))
        .merge(transport.routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
