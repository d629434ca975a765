//! Error types for conduit-core

use thiserror::Error;

use crate::jsonrpc::{self, JsonRpcError};
use crate::session::SessionId;

/// Top-level error type for conduit-core
#[derive(Error, Debug)]
pub enum ConduitError {
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors raised while routing a request to a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),
}

/// Errors from writing to a session's stream channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Stream channel closed")]
    Closed,

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from decoding an inbound JSON-RPC message
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not JSON at all
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Valid JSON that is not a well-formed request, notification or response
    #[error("Invalid Request: {0}")]
    InvalidRequest(#[source] serde_json::Error),
}

impl DecodeError {
    /// JSON-RPC error code for this failure
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => jsonrpc::PARSE_ERROR,
            Self::InvalidRequest(_) => jsonrpc::INVALID_REQUEST,
        }
    }
}

/// Errors from the session registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session already registered: {0}")]
    DuplicateSession(SessionId),
}

/// Errors from closing a session during a shutdown sweep
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloseError {
    #[error("Timed out closing session {0}")]
    TimedOut(SessionId),

    #[error("Failed to close session {id}: {message}")]
    Failed { id: SessionId, message: String },
}

/// Domain failures reported by a handler set
///
/// These are carried back to the client in the JSON-RPC error field and are
/// never treated as transport faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// JSON-RPC error code for this failure
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidParams(_) => jsonrpc::INVALID_PARAMS,
            Self::NotFound(_) => jsonrpc::RESOURCE_NOT_FOUND,
            Self::Upstream(_) | Self::Internal(_) => jsonrpc::INTERNAL_ERROR,
        }
    }
}

impl From<HandlerError> for JsonRpcError {
    fn from(err: HandlerError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.to_string(),
            data: None,
        }
    }
}
