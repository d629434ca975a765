use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::protocol::{
    ListResourceTemplatesResult, ListResourcesResult, PaginatedParams, ReadResourceParams,
    ReadResourceResult, Resource, ResourceContents, ResourceTemplate,
};
use conduit_core::{HandlerError, RequestContext, ResourceHandler};

use super::{require_gid, to_json_text, upstream};
use crate::api::WorkItemApi;

const WORKSPACE_PREFIX: &str = "asana://workspace/";
const TASK_PREFIX: &str = "asana://task/";
const JSON_MIME: &str = "application/json";

/// Resource URI understood by [`WorkItemResources`]
#[derive(Debug, PartialEq, Eq)]
enum ResourceUri<'a> {
    Workspace(&'a str),
    Task(&'a str),
}

impl<'a> ResourceUri<'a> {
    fn parse(uri: &'a str) -> Option<Self> {
        if let Some(gid) = uri.strip_prefix(WORKSPACE_PREFIX) {
            return (!gid.is_empty()).then_some(Self::Workspace(gid));
        }
        if let Some(gid) = uri.strip_prefix(TASK_PREFIX) {
            return (!gid.is_empty()).then_some(Self::Task(gid));
        }
        None
    }
}

pub struct WorkItemResources {
    api: Arc<dyn WorkItemApi>,
}

impl WorkItemResources {
    pub fn new(api: Arc<dyn WorkItemApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResourceHandler for WorkItemResources {
    async fn list_resources(
        &self,
        _ctx: &RequestContext,
        _params: PaginatedParams,
    ) -> Result<ListResourcesResult, HandlerError> {
        let workspaces = self.api.list_workspaces().await.map_err(upstream)?;

        Ok(ListResourcesResult {
            resources: workspaces
                .into_iter()
                .map(|ws| Resource {
                    uri: format!("{WORKSPACE_PREFIX}{}", ws.gid),
                    name: ws.name,
                    description: Some("Workspace".into()),
                    mime_type: Some(JSON_MIME.into()),
                })
                .collect(),
            next_cursor: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _ctx: &RequestContext,
        _params: PaginatedParams,
    ) -> Result<ListResourceTemplatesResult, HandlerError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: vec![ResourceTemplate {
                uri_template: format!("{TASK_PREFIX}{{task_id}}"),
                name: "Task".into(),
                description: Some("A single task with notes and assignee".into()),
                mime_type: Some(JSON_MIME.into()),
            }],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        _ctx: &RequestContext,
        params: ReadResourceParams,
    ) -> Result<ReadResourceResult, HandlerError> {
        let text = match ResourceUri::parse(&params.uri) {
            Some(ResourceUri::Workspace(gid)) => {
                let gid = require_gid("workspace id", gid)?;
                to_json_text(&self.api.get_workspace(gid).await.map_err(upstream)?)?
            }
            Some(ResourceUri::Task(gid)) => {
                let gid = require_gid("task id", gid)?;
                to_json_text(&self.api.get_task(gid).await.map_err(upstream)?)?
            }
            None => return Err(HandlerError::NotFound(format!("resource {}", params.uri))),
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: Some(JSON_MIME.into()),
                text,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::fake::FakeApi;
    use conduit_core::SessionId;

    fn ctx() -> RequestContext {
        RequestContext {
            session_id: SessionId::from("s2"),
            transport: "sse",
        }
    }

    fn resources(api: FakeApi) -> WorkItemResources {
        WorkItemResources::new(Arc::new(api))
    }

    #[test]
    fn parses_known_uri_kinds() {
        assert_eq!(
            ResourceUri::parse("asana://workspace/1"),
            Some(ResourceUri::Workspace("1"))
        );
        assert_eq!(
            ResourceUri::parse("asana://task/42"),
            Some(ResourceUri::Task("42"))
        );
        assert_eq!(ResourceUri::parse("asana://task/"), None);
        assert_eq!(ResourceUri::parse("file:///etc/passwd"), None);
    }

    #[tokio::test]
    async fn workspaces_are_listed_as_resources() {
        let result = resources(FakeApi::healthy())
            .list_resources(&ctx(), PaginatedParams::default())
            .await
            .unwrap();

        assert_eq!(result.resources.len(), 1);
        assert_eq!(result.resources[0].uri, "asana://workspace/1");
        assert_eq!(result.resources[0].name, "Acme");
    }

    #[tokio::test]
    async fn template_names_task_uri() {
        let result = resources(FakeApi::healthy())
            .list_resource_templates(&ctx(), PaginatedParams::default())
            .await
            .unwrap();

        assert_eq!(
            result.resource_templates[0].uri_template,
            "asana://task/{task_id}"
        );
    }

    #[tokio::test]
    async fn read_task_resource_echoes_uri() {
        let result = resources(FakeApi::healthy())
            .read_resource(
                &ctx(),
                ReadResourceParams {
                    uri: "asana://task/42".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.contents[0].uri, "asana://task/42");
        assert!(result.contents[0].text.contains("Write docs"));
    }

    #[tokio::test]
    async fn unknown_uri_is_not_found() {
        let err = resources(FakeApi::healthy())
            .read_resource(
                &ctx(),
                ReadResourceParams {
                    uri: "asana://user/me".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_in_uri_is_invalid_params() {
        let resources = resources(FakeApi::healthy());

        for uri in ["asana://workspace/../users/me", "asana://task/42%2F..%2F7"] {
            let err = resources
                .read_resource(&ctx(), ReadResourceParams { uri: uri.into() })
                .await
                .unwrap_err();
            assert!(matches!(err, HandlerError::InvalidParams(_)), "{uri}");
        }
    }

    #[tokio::test]
    async fn listing_with_failing_api_is_upstream_error() {
        let err = resources(FakeApi::failing())
            .list_resources(&ctx(), PaginatedParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Upstream(_)));
    }
}
