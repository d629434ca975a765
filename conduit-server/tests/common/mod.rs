//! Shared test utilities for conduit-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::protocol::{
    CallToolParams, CallToolResult, ListToolsResult, PaginatedParams, ServerInfo, Tool,
};
use conduit_core::{
    HandlerError, HandlerSet, RequestContext, SequentialIdGenerator, SessionLifecycleManager,
    SessionRegistry, ShutdownReport, ToolHandler,
};
use conduit_server::{AppState, ConduitServer, ServerConfig, ServerError, TransportKind};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Tool group with a fixed listing and an echoing `echo` tool
pub struct FixedTools;

impl FixedTools {
    pub fn tools() -> Vec<Tool> {
        vec![
            Tool {
                name: "echo".into(),
                description: Some("Echo the message argument".into()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}}
                }),
            },
            Tool {
                name: "get_task".into(),
                description: None,
                input_schema: json!({"type": "object"}),
            },
        ]
    }
}

#[async_trait]
impl ToolHandler for FixedTools {
    async fn list_tools(
        &self,
        _ctx: &RequestContext,
        _params: PaginatedParams,
    ) -> Result<ListToolsResult, HandlerError> {
        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        ctx: &RequestContext,
        params: CallToolParams,
    ) -> Result<CallToolResult, HandlerError> {
        match params.name.as_str() {
            "echo" => {
                let message = params
                    .arguments
                    .as_ref()
                    .and_then(|args| args.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or_default();
                Ok(CallToolResult::text(format!("{}: {}", ctx.session_id, message)))
            }
            other => Err(HandlerError::NotFound(format!("tool '{}'", other))),
        }
    }
}

/// A server running on an ephemeral port
pub struct RunningServer {
    pub state: Arc<AppState>,
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<ShutdownReport, ServerError>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to drain
    pub async fn shutdown(mut self) -> ShutdownReport {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
            .expect("server failed")
    }
}

/// Creates a test server with sequential session ids (`s1`, `s2`, ...)
#[allow(dead_code)]
pub async fn create_test_server(transport: TransportKind) -> RunningServer {
    create_test_server_with(transport, |state| state).await
}

/// Like [`create_test_server`], with a hook to adjust the state first
#[allow(dead_code)]
pub async fn create_test_server_with(
    transport: TransportKind,
    configure: impl FnOnce(AppState) -> AppState,
) -> RunningServer {
    let lifecycle = Arc::new(SessionLifecycleManager::with_id_generator(
        Arc::new(SessionRegistry::new()),
        Arc::new(SequentialIdGenerator::default()),
    ));
    let handlers = HandlerSet::builder(ServerInfo::new("conduit-test", "0.0.0"))
        .tools(Arc::new(FixedTools))
        .build();
    let state = AppState::with_components(lifecycle, Arc::new(handlers))
        .with_keep_alive(Duration::from_millis(100));
    let state = configure(state);

    let config = ServerConfig::new("127.0.0.1", 0).with_transport(transport);
    let server = ConduitServer::with_state(config, state);
    spawn_server(server).await
}

/// Spawns server in background task, returns a handle to it
async fn spawn_server(server: ConduitServer) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = server.state();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        server
            .run_until(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;

    RunningServer {
        state,
        addr,
        shutdown: Some(shutdown_tx),
        task,
    }
}

/// Poll until the server holds `expected` live sessions
#[allow(dead_code)]
pub async fn wait_for_session_count(state: &AppState, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let count = state.lifecycle.session_count().await;
        if count == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} sessions, still have {}",
            expected,
            count
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
