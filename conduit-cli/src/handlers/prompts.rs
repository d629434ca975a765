use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::protocol::{
    ContentBlock, GetPromptParams, GetPromptResult, ListPromptsResult, PaginatedParams, Prompt,
    PromptArgument, PromptMessage, Role,
};
use conduit_core::{HandlerError, PromptHandler, RequestContext};

use super::{require_gid, upstream};
use crate::api::{Task, WorkItemApi};

pub const TASK_SUMMARY_PROMPT: &str = "task-summary";

pub struct WorkItemPrompts {
    api: Arc<dyn WorkItemApi>,
}

impl WorkItemPrompts {
    pub fn new(api: Arc<dyn WorkItemApi>) -> Self {
        Self { api }
    }
}

fn task_summary_text(task: &Task) -> String {
    let mut text = format!(
        "Summarize the current status of task \"{}\" ({}).\n",
        task.name, task.gid
    );
    text.push_str(&format!(
        "Completed: {}\n",
        if task.completed { "yes" } else { "no" }
    ));
    if let Some(due) = &task.due_on {
        text.push_str(&format!("Due: {due}\n"));
    }
    if let Some(assignee) = task.assignee.as_ref().and_then(|a| a.name.as_deref()) {
        text.push_str(&format!("Assignee: {assignee}\n"));
    }
    if let Some(notes) = task.notes.as_deref().filter(|n| !n.is_empty()) {
        text.push_str(&format!("\nNotes:\n{notes}\n"));
    }
    text.push_str("\nList what is done, what remains, and any blockers.");
    text
}

#[async_trait]
impl PromptHandler for WorkItemPrompts {
    async fn list_prompts(
        &self,
        _ctx: &RequestContext,
        _params: PaginatedParams,
    ) -> Result<ListPromptsResult, HandlerError> {
        Ok(ListPromptsResult {
            prompts: vec![Prompt {
                name: TASK_SUMMARY_PROMPT.into(),
                description: Some("Summarize a task's status, notes and blockers".into()),
                arguments: vec![PromptArgument {
                    name: "task_id".into(),
                    description: Some("Task to summarize".into()),
                    required: true,
                }],
            }],
            next_cursor: None,
        })
    }

    async fn get_prompt(
        &self,
        _ctx: &RequestContext,
        params: GetPromptParams,
    ) -> Result<GetPromptResult, HandlerError> {
        if params.name != TASK_SUMMARY_PROMPT {
            return Err(HandlerError::NotFound(format!("prompt {}", params.name)));
        }
        let task_id = params
            .arguments
            .get("task_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HandlerError::InvalidParams("task_id is required".into()))?;
        let task_id = require_gid("task_id", task_id)?;

        let task = self.api.get_task(task_id).await.map_err(upstream)?;

        Ok(GetPromptResult {
            description: Some(format!("Status summary for {}", task.name)),
            messages: vec![PromptMessage {
                role: Role::User,
                content: ContentBlock::text(task_summary_text(&task)),
            }],
        })
    }
}
