//! HTTP client for the work-item API.
//!
//! Every endpoint wraps its payload in a `{"data": ...}` envelope. The handler
//! set talks to the API through [`WorkItemApi`] so tests can swap in a fake.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fields requested for task lookups
const TASK_FIELDS: &str = "name,notes,completed,due_on,assignee.name,projects.name,permalink_url";

/// Failures talking to the work-item API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("cannot build request URL from {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub gid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub gid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub gid: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub assignee: Option<NamedRef>,
    #[serde(default)]
    pub projects: Vec<NamedRef>,
    #[serde(default)]
    pub permalink_url: Option<String>,
}

/// Compact task row returned by search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub gid: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Operations the handler set needs from the work-item API
#[async_trait]
pub trait WorkItemApi: Send + Sync {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>, ApiError>;

    async fn get_workspace(&self, workspace_gid: &str) -> Result<Workspace, ApiError>;

    async fn get_task(&self, task_gid: &str) -> Result<Task, ApiError>;

    async fn search_tasks(
        &self,
        workspace_gid: &str,
        text: &str,
        completed: Option<bool>,
    ) -> Result<Vec<TaskSummary>, ApiError>;

    async fn list_projects(&self, workspace_gid: &str) -> Result<Vec<Project>, ApiError>;
}

/// reqwest-backed [`WorkItemApi`] using bearer authentication
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Join path segments onto the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let invalid = |message: String| ApiError::InvalidUrl {
            url: self.base_url.clone(),
            message,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let endpoint = self.endpoint(segments)?;
        let url = endpoint.to_string();
        tracing::debug!(url = %url, "work-item API request");

        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { url, status, body });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|source| ApiError::Request { url, source })?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl WorkItemApi for ApiClient {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        self.get(&["workspaces"], &[]).await
    }

    async fn get_workspace(&self, workspace_gid: &str) -> Result<Workspace, ApiError> {
        self.get(&["workspaces", workspace_gid], &[]).await
    }

    async fn get_task(&self, task_gid: &str) -> Result<Task, ApiError> {
        self.get(
            &["tasks", task_gid],
            &[("opt_fields", TASK_FIELDS.to_string())],
        )
        .await
    }

    async fn search_tasks(
        &self,
        workspace_gid: &str,
        text: &str,
        completed: Option<bool>,
    ) -> Result<Vec<TaskSummary>, ApiError> {
        let mut query = vec![("text", text.to_string())];
        if let Some(completed) = completed {
            query.push(("completed", completed.to_string()));
        }
        self.get(&["workspaces", workspace_gid, "tasks", "search"], &query)
            .await
    }

    async fn list_projects(&self, workspace_gid: &str) -> Result<Vec<Project>, ApiError> {
        self.get(
            &["projects"],
            &[
                ("workspace", workspace_gid.to_string()),
                ("archived", "false".to_string()),
            ],
        )
        .await
    }
}
