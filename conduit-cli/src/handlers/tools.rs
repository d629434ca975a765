use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::protocol::{
    CallToolParams, CallToolResult, ListToolsResult, PaginatedParams, Tool,
};
use conduit_core::{HandlerError, RequestContext, ToolHandler};
use serde::Deserialize;
use serde_json::json;

use super::{parse_arguments, require_gid, to_json_text, upstream};
use crate::api::WorkItemApi;

#[derive(Debug, Deserialize)]
struct GetTaskArgs {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchTasksArgs {
    workspace: String,
    text: String,
    #[serde(default)]
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListProjectsArgs {
    workspace: String,
}

/// Tools backed by the work-item API
pub struct WorkItemTools {
    api: Arc<dyn WorkItemApi>,
}

impl WorkItemTools {
    pub fn new(api: Arc<dyn WorkItemApi>) -> Self {
        Self { api }
    }

    fn catalog() -> Vec<Tool> {
        vec![
            Tool {
                name: "list_workspaces".into(),
                description: Some("List the workspaces visible to the access token".into()),
                input_schema: json!({"type": "object", "properties": {}}),
            },
            Tool {
                name: "get_task".into(),
                description: Some("Fetch a task by id".into()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"task_id": {"type": "string"}},
                    "required": ["task_id"]
                }),
            },
            Tool {
                name: "search_tasks".into(),
                description: Some("Full-text search for tasks in a workspace".into()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "workspace": {"type": "string"},
                        "text": {"type": "string"},
                        "completed": {"type": "boolean"}
                    },
                    "required": ["workspace", "text"]
                }),
            },
            Tool {
                name: "list_projects".into(),
                description: Some("List active projects in a workspace".into()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"workspace": {"type": "string"}},
                    "required": ["workspace"]
                }),
            },
        ]
    }
}

#[async_trait]
impl ToolHandler for WorkItemTools {
    async fn list_tools(
        &self,
        _ctx: &RequestContext,
        _params: PaginatedParams,
    ) -> Result<ListToolsResult, HandlerError> {
        Ok(ListToolsResult {
            tools: Self::catalog(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        ctx: &RequestContext,
        params: CallToolParams,
    ) -> Result<CallToolResult, HandlerError> {
        tracing::debug!(session_id = %ctx.session_id, tool = %params.name, "calling tool");

        let text = match params.name.as_str() {
            "list_workspaces" => {
                let workspaces = self.api.list_workspaces().await.map_err(upstream)?;
                to_json_text(&workspaces)?
            }
            "get_task" => {
                let args: GetTaskArgs = parse_arguments(params.arguments)?;
                let task_gid = require_gid("task_id", &args.task_id)?;
                let task = self.api.get_task(task_gid).await.map_err(upstream)?;
                to_json_text(&task)?
            }
            "search_tasks" => {
                let args: SearchTasksArgs = parse_arguments(params.arguments)?;
                let workspace = require_gid("workspace", &args.workspace)?;
                let tasks = self
                    .api
                    .search_tasks(workspace, &args.text, args.completed)
                    .await
                    .map_err(upstream)?;
                to_json_text(&tasks)?
            }
            "list_projects" => {
                let args: ListProjectsArgs = parse_arguments(params.arguments)?;
                let workspace = require_gid("workspace", &args.workspace)?;
                let projects = self
                    .api
                    .list_projects(workspace)
                    .await
                    .map_err(upstream)?;
                to_json_text(&projects)?
            }
            other => return Err(HandlerError::NotFound(format!("tool {other}"))),
        };

        Ok(CallToolResult::text(text))
    }
}
