//! Request routing from a session id to the handler set
//!
//! The router resolves the session in the registry, then hands the decoded
//! message to the process-wide [`HandlerSet`]. Handler failures come back as
//! JSON-RPC error responses; only a missing session is a routing error.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{HandlerError, RouteError};
use crate::handlers::{HandlerSet, RequestContext};
use crate::jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
};
use crate::protocol::{InitializeParams, InitializeResult, negotiate_protocol_version};
use crate::session::{Session, SessionId, SessionRegistry};

/// Routes correlated client messages to the handler set
pub struct RequestRouter {
    registry: Arc<SessionRegistry>,
    handlers: Arc<HandlerSet>,
}

impl RequestRouter {
    pub fn new(registry: Arc<SessionRegistry>, handlers: Arc<HandlerSet>) -> Self {
        Self { registry, handlers }
    }

    pub fn handlers(&self) -> &Arc<HandlerSet> {
        &self.handlers
    }

    /// Look up a live session
    pub async fn resolve(&self, id: &SessionId) -> Result<Arc<Session>, RouteError> {
        self.registry.get(id).await.ok_or_else(|| {
            warn!(session_id = %id, "No active session for request");
            RouteError::SessionNotFound(id.clone())
        })
    }

    /// Resolve the session and dispatch the message
    ///
    /// Requests produce `Some(response)`; notifications and client responses
    /// produce `None` once the session check passes.
    pub async fn route(
        &self,
        id: &SessionId,
        message: JsonRpcMessage,
    ) -> Result<Option<JsonRpcResponse>, RouteError> {
        let session = self.resolve(id).await?;
        Ok(self.dispatch(&session, message).await)
    }

    /// Dispatch a message on behalf of an already resolved session
    pub async fn dispatch(
        &self,
        session: &Session,
        message: JsonRpcMessage,
    ) -> Option<JsonRpcResponse> {
        let ctx = RequestContext {
            session_id: session.id().clone(),
            transport: session.transport(),
        };

        match message {
            JsonRpcMessage::Request(req) => Some(self.handle_request(&ctx, req).await),
            JsonRpcMessage::Notification(n) => {
                debug!(session_id = %ctx.session_id, method = %n.method, "notification received");
                None
            }
            JsonRpcMessage::Response(resp) => {
                debug!(session_id = %ctx.session_id, id = %resp.id, "client response ignored");
                None
            }
        }
    }

    async fn handle_request(&self, ctx: &RequestContext, req: JsonRpcRequest) -> JsonRpcResponse {
        if req.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::err(
                req.id,
                JsonRpcError::invalid_request("invalid jsonrpc version"),
            );
        }

        debug!(session_id = %ctx.session_id, method = %req.method, "Received {} request", req.method);
        let id = req.id;
        let params = req.params;
        let handlers = &self.handlers;

        match req.method.as_str() {
            "initialize" => {
                let init: InitializeParams = match decode_or_default(params) {
                    Ok(p) => p,
                    Err(e) => return JsonRpcResponse::err(id, e),
                };
                let result = InitializeResult {
                    protocol_version: negotiate_protocol_version(init.protocol_version.as_deref())
                        .to_string(),
                    capabilities: handlers.capabilities(),
                    server_info: handlers.server_info().clone(),
                };
                respond(id, Ok(result))
            }
            "ping" => JsonRpcResponse::ok(id, serde_json::json!({})),

            "tools/list" => match (handlers.tools(), decode_or_default(params)) {
                (None, _) => not_found(id, "tools/list"),
                (_, Err(e)) => JsonRpcResponse::err(id, e),
                (Some(h), Ok(p)) => respond(id, h.list_tools(ctx, p).await),
            },
            "tools/call" => match (handlers.tools(), decode_required(params)) {
                (None, _) => not_found(id, "tools/call"),
                (_, Err(e)) => JsonRpcResponse::err(id, e),
                (Some(h), Ok(p)) => respond(id, h.call_tool(ctx, p).await),
            },

            "prompts/list" => match (handlers.prompts(), decode_or_default(params)) {
                (None, _) => not_found(id, "prompts/list"),
                (_, Err(e)) => JsonRpcResponse::err(id, e),
                (Some(h), Ok(p)) => respond(id, h.list_prompts(ctx, p).await),
            },
            "prompts/get" => match (handlers.prompts(), decode_required(params)) {
                (None, _) => not_found(id, "prompts/get"),
                (_, Err(e)) => JsonRpcResponse::err(id, e),
                (Some(h), Ok(p)) => respond(id, h.get_prompt(ctx, p).await),
            },

            "resources/list" => match (handlers.resources(), decode_or_default(params)) {
                (None, _) => not_found(id, "resources/list"),
                (_, Err(e)) => JsonRpcResponse::err(id, e),
                (Some(h), Ok(p)) => respond(id, h.list_resources(ctx, p).await),
            },
            "resources/templates/list" => {
                match (handlers.resources(), decode_or_default(params)) {
                    (None, _) => not_found(id, "resources/templates/list"),
                    (_, Err(e)) => JsonRpcResponse::err(id, e),
                    (Some(h), Ok(p)) => respond(id, h.list_resource_templates(ctx, p).await),
                }
            }
            "resources/read" => match (handlers.resources(), decode_required(params)) {
                (None, _) => not_found(id, "resources/read"),
                (_, Err(e)) => JsonRpcResponse::err(id, e),
                (Some(h), Ok(p)) => respond(id, h.read_resource(ctx, p).await),
            },

            other => not_found(id, other),
        }
    }
}

fn not_found(id: JsonRpcId, method: &str) -> JsonRpcResponse {
    JsonRpcResponse::err(id, JsonRpcError::method_not_found(method))
}

/// Decode optional params, treating absence as the default value
fn decode_or_default<P: DeserializeOwned + Default>(
    params: Option<Value>,
) -> Result<P, JsonRpcError> {
    match params {
        None | Some(Value::Null) => Ok(P::default()),
        Some(v) => serde_json::from_value(v).map_err(JsonRpcError::invalid_params),
    }
}

fn decode_required<P: DeserializeOwned>(params: Option<Value>) -> Result<P, JsonRpcError> {
    let value = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
    serde_json::from_value(value).map_err(JsonRpcError::invalid_params)
}

fn respond<T: Serialize>(id: JsonRpcId, result: Result<T, HandlerError>) -> JsonRpcResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(v) => JsonRpcResponse::ok(id, v),
            Err(e) => JsonRpcResponse::err(id, JsonRpcError::internal(e)),
        },
        Err(e) => {
            debug!(id = %id, "handler returned error: {}", e);
            JsonRpcResponse::err(id, e.into())
        }
    }
}
