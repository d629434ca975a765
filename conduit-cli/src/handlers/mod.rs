//! Work-item handler set exposed over MCP

mod prompts;
mod resources;
mod tools;

use std::sync::Arc;

use conduit_core::HandlerError;
use conduit_core::HandlerSet;
use conduit_core::protocol::ServerInfo;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{ApiError, WorkItemApi};

use prompts::WorkItemPrompts;
use resources::WorkItemResources;
use tools::WorkItemTools;

/// Name reported in the `initialize` response
pub const SERVER_NAME: &str = "conduit";

/// Assemble the tools, prompts and resources groups over one API client
pub fn build_handler_set(api: Arc<dyn WorkItemApi>) -> HandlerSet {
    HandlerSet::builder(ServerInfo::new(SERVER_NAME, env!("CARGO_PKG_VERSION")))
        .tools(Arc::new(WorkItemTools::new(api.clone())))
        .prompts(Arc::new(WorkItemPrompts::new(api.clone())))
        .resources(Arc::new(WorkItemResources::new(api)))
        .build()
}

fn upstream(err: ApiError) -> HandlerError {
    tracing::warn!(error = %err, "work-item API call failed");
    HandlerError::Upstream(err.to_string())
}

fn parse_arguments<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, HandlerError> {
    let value = arguments.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| HandlerError::InvalidParams(e.to_string()))
}

/// Accept only numeric object ids before they reach an API path
fn require_gid<'a>(field: &str, value: &'a str) -> Result<&'a str, HandlerError> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(value)
    } else {
        Err(HandlerError::InvalidParams(format!(
            "{field} must be a numeric id, got {value:?}"
        )))
    }
}

fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, HandlerError> {
    serde_json::to_string_pretty(value).map_err(|e| HandlerError::Internal(e.to_string()))
}
