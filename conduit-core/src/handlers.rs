//! Handler set capability traits
//!
//! A [`HandlerSet`] is assembled once at startup from up to three capability
//! groups and shared by every session. The groups are stateless with respect
//! to sessions; the [`RequestContext`] tells them which session asked.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::HandlerError;
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, PaginatedParams,
    ReadResourceParams, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use crate::session::SessionId;

/// Per-request information handed to handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub session_id: SessionId,
    pub transport: &'static str,
}

/// `tools/list` and `tools/call`
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn list_tools(
        &self,
        ctx: &RequestContext,
        params: PaginatedParams,
    ) -> Result<ListToolsResult, HandlerError>;

    async fn call_tool(
        &self,
        ctx: &RequestContext,
        params: CallToolParams,
    ) -> Result<CallToolResult, HandlerError>;
}

/// `prompts/list` and `prompts/get`
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn list_prompts(
        &self,
        ctx: &RequestContext,
        params: PaginatedParams,
    ) -> Result<ListPromptsResult, HandlerError>;

    async fn get_prompt(
        &self,
        ctx: &RequestContext,
        params: GetPromptParams,
    ) -> Result<GetPromptResult, HandlerError>;
}

/// `resources/list`, `resources/templates/list` and `resources/read`
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn list_resources(
        &self,
        ctx: &RequestContext,
        params: PaginatedParams,
    ) -> Result<ListResourcesResult, HandlerError>;

    async fn list_resource_templates(
        &self,
        ctx: &RequestContext,
        params: PaginatedParams,
    ) -> Result<ListResourceTemplatesResult, HandlerError>;

    async fn read_resource(
        &self,
        ctx: &RequestContext,
        params: ReadResourceParams,
    ) -> Result<ReadResourceResult, HandlerError>;
}

/// Process-wide, immutable collection of capability groups
#[derive(Clone)]
pub struct HandlerSet {
    server_info: ServerInfo,
    tools: Option<Arc<dyn ToolHandler>>,
    prompts: Option<Arc<dyn PromptHandler>>,
    resources: Option<Arc<dyn ResourceHandler>>,
}

impl HandlerSet {
    pub fn builder(server_info: ServerInfo) -> HandlerSetBuilder {
        HandlerSetBuilder {
            set: HandlerSet {
                server_info,
                tools: None,
                prompts: None,
                resources: None,
            },
        }
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn tools(&self) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.as_ref()
    }

    pub fn prompts(&self) -> Option<&Arc<dyn PromptHandler>> {
        self.prompts.as_ref()
    }

    pub fn resources(&self) -> Option<&Arc<dyn ResourceHandler>> {
        self.resources.as_ref()
    }

    /// Capabilities advertised in the `initialize` response
    pub fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools.as_ref().map(|_| json!({})),
            prompts: self.prompts.as_ref().map(|_| json!({})),
            resources: self.resources.as_ref().map(|_| json!({})),
        }
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("server_info", &self.server_info)
            .field("tools", &self.tools.is_some())
            .field("prompts", &self.prompts.is_some())
            .field("resources", &self.resources.is_some())
            .finish()
    }
}

/// Builder for [`HandlerSet`]
pub struct HandlerSetBuilder {
    set: HandlerSet,
}

impl HandlerSetBuilder {
    pub fn tools(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.set.tools = Some(handler);
        self
    }

    pub fn prompts(mut self, handler: Arc<dyn PromptHandler>) -> Self {
        self.set.prompts = Some(handler);
        self
    }

    pub fn resources(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.set.resources = Some(handler);
        self
    }

    pub fn build(self) -> HandlerSet {
        self.set
    }
}
