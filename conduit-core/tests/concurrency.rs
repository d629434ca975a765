//! Concurrency tests for session lifecycle and routing
//!
//! These tests validate that the registry stays consistent under races:
//! - Concurrent creations never share an id
//! - Concurrent closes of one session close it exactly once
//! - A route racing a close either completes or reports the session missing

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::protocol::{
    CallToolParams, CallToolResult, ListToolsResult, PaginatedParams, ServerInfo,
};
use conduit_core::{
    ChannelError, CloseReason, Frame, HandlerError, HandlerSet, JsonRpcId, JsonRpcMessage,
    JsonRpcRequest, RequestContext, RequestRouter, RouteError, SessionEvent,
    SessionLifecycleManager, SessionRegistry, ToolHandler,
};
use tokio::sync::mpsc;

struct SlowTools;

#[async_trait]
impl ToolHandler for SlowTools {
    async fn list_tools(
        &self,
        _ctx: &RequestContext,
        _params: PaginatedParams,
    ) -> Result<ListToolsResult, HandlerError> {
        tokio::task::yield_now().await;
        Ok(ListToolsResult {
            tools: vec![],
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        _ctx: &RequestContext,
        params: CallToolParams,
    ) -> Result<CallToolResult, HandlerError> {
        Err(HandlerError::NotFound(params.name))
    }
}

fn create_test_stack() -> (Arc<SessionLifecycleManager>, Arc<RequestRouter>) {
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = Arc::new(SessionLifecycleManager::new(Arc::clone(&registry)));
    let handlers = HandlerSet::builder(ServerInfo::new("concurrency", "0.0.0"))
        .tools(Arc::new(SlowTools))
        .build();
    let router = Arc::new(RequestRouter::new(registry, Arc::new(handlers)));
    (lifecycle, router)
}

fn list_tools() -> JsonRpcMessage {
    JsonRpcMessage::Request(JsonRpcRequest::new(
        JsonRpcId::Number(1),
        "tools/list",
        None,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_session_creation_yields_unique_resolvable_ids() {
    let (lifecycle, _router) = create_test_stack();
    let mut handles = vec![];

    for _ in 0..100 {
        let lifecycle = Arc::clone(&lifecycle);
        handles.push(tokio::spawn(async move {
            let (tx, rx) = mpsc::channel(4);
            let id = lifecycle.create_session("sse", tx).await.unwrap();
            // Resolvable as soon as create returns
            assert!(lifecycle.contains(&id).await);
            (id, rx)
        }));
    }

    let mut ids = HashSet::new();
    let mut receivers = vec![];
    for handle in handles {
        let (id, rx) = handle.await.unwrap();
        assert!(ids.insert(id), "duplicate session id issued");
        receivers.push(rx);
    }

    assert_eq!(ids.len(), 100);
    assert_eq!(lifecycle.session_count().await, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_close_of_one_session_closes_exactly_once() {
    let (lifecycle, _router) = create_test_stack();
    let (tx, _rx) = mpsc::channel(4);
    let id = lifecycle.create_session("sse", tx).await.unwrap();
    let mut events = lifecycle.subscribe();

    let mut handles = vec![];
    for i in 0..16 {
        let lifecycle = Arc::clone(&lifecycle);
        let id = id.clone();
        let reason = if i % 2 == 0 {
            CloseReason::Explicit
        } else {
            CloseReason::Shutdown
        };
        handles.push(tokio::spawn(async move {
            lifecycle.close_session(&id, reason).await
        }));
    }

    let mut performed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            performed += 1;
        }
    }

    assert_eq!(performed, 1, "exactly one close should take effect");
    assert!(!lifecycle.contains(&id).await);
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Closed { .. }
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn route_racing_close_completes_or_reports_missing() {
    let (lifecycle, router) = create_test_stack();

    for _ in 0..50 {
        let (tx, _rx) = mpsc::channel(4);
        let id = lifecycle.create_session("sse", tx).await.unwrap();

        let route = {
            let router = Arc::clone(&router);
            let id = id.clone();
            tokio::spawn(async move { router.route(&id, list_tools()).await })
        };
        let close = {
            let lifecycle = Arc::clone(&lifecycle);
            let id = id.clone();
            tokio::spawn(async move { lifecycle.close_session(&id, CloseReason::Explicit).await })
        };

        let routed = route.await.unwrap();
        assert!(close.await.unwrap());

        match routed {
            Ok(Some(resp)) => assert!(resp.result.is_some()),
            Err(RouteError::SessionNotFound(missing)) => assert_eq!(missing, id),
            Ok(None) => panic!("request must produce a response"),
        }

        // Once closed, the id never resolves again
        assert!(matches!(
            router.route(&id, list_tools()).await,
            Err(RouteError::SessionNotFound(_))
        ));
    }
}

#[tokio::test]
async fn closing_one_session_leaves_other_channels_writable() {
    let (lifecycle, router) = create_test_stack();
    let (tx1, _rx1) = mpsc::channel(4);
    let (tx2, mut rx2) = mpsc::channel(4);
    let id1 = lifecycle.create_session("sse", tx1).await.unwrap();
    let id2 = lifecycle.create_session("sse", tx2).await.unwrap();
    let session1 = router.resolve(&id1).await.unwrap();

    lifecycle.close_session(&id1, CloseReason::Explicit).await;

    assert!(matches!(
        session1.channel().write(Frame::Endpoint("/late".into())).await,
        Err(ChannelError::Closed)
    ));

    let session2 = router.resolve(&id2).await.unwrap();
    session2
        .channel()
        .write(Frame::Endpoint("/still-open".into()))
        .await
        .unwrap();
    assert_eq!(
        rx2.recv().await,
        Some(Frame::Endpoint("/still-open".into()))
    );
}
