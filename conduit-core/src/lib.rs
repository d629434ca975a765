//! conduit-core: session-keyed streaming transport core for conduit
//!
//! This crate provides the transport-agnostic pieces of the conduit MCP
//! bridge:
//!
//! - **Sessions** - [`SessionRegistry`] and [`SessionLifecycleManager`] for minting,
//!   tracking and closing sessions bound to a [`StreamChannel`]
//! - **Routing** - [`RequestRouter`] resolves a session id and delegates to the [`HandlerSet`]
//! - **Handlers** - [`ToolHandler`], [`PromptHandler`] and [`ResourceHandler`] capability groups
//! - **Shutdown** - [`ShutdownCoordinator`] sweeps every live session on termination
//! - **Wire types** - JSON-RPC envelopes in [`jsonrpc`] and MCP payloads in [`protocol`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use conduit_core::protocol::ServerInfo;
//! use conduit_core::{HandlerSet, RequestRouter, SessionLifecycleManager, SessionRegistry};
//! use tokio::sync::mpsc;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(SessionRegistry::new());
//!     let lifecycle = Arc::new(SessionLifecycleManager::new(Arc::clone(&registry)));
//!     let handlers = Arc::new(HandlerSet::builder(ServerInfo::new("demo", "0.1.0")).build());
//!     let router = RequestRouter::new(registry, handlers);
//!
//!     // The transport keeps `rx` and streams it to the client
//!     let (tx, _rx) = mpsc::channel(64);
//!     let session_id = lifecycle.create_session("sse", tx).await?;
//!
//!     let message = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)?;
//!     let response = router.route(&session_id, message).await?;
//!     println!("{:?}", response);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 SessionLifecycleManager                  │
//! │   create_session ──► SessionRegistry ◄── close_session   │
//! │                          │   ▲                           │
//! │                  Session │   │ disconnect watcher        │
//! │                 ┌────────▼───┴────┐                      │
//! │                 │  StreamChannel  │──► transport body    │
//! │                 └─────────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//!            ▲                                   ▲
//!      RequestRouter ──► HandlerSet      ShutdownCoordinator
//! ```

pub mod error;
pub mod handlers;
pub mod jsonrpc;
pub mod protocol;
pub mod router;
pub mod session;
pub mod shutdown;

// Re-export key types for convenience
pub use error::{
    ChannelError, CloseError, ConduitError, DecodeError, HandlerError, RegistryError, RouteError,
};
pub use handlers::{
    HandlerSet, HandlerSetBuilder, PromptHandler, RequestContext, ResourceHandler, ToolHandler,
};
pub use jsonrpc::{JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
pub use router::RequestRouter;
pub use session::{
    CloseReason, DEFAULT_CHANNEL_CAPACITY, Frame, IdGenerator, SequentialIdGenerator, Session,
    SessionEvent, SessionId, SessionLifecycleManager, SessionRegistry, SessionState,
    SessionSummary, StreamChannel, UuidIdGenerator,
};
pub use shutdown::{SessionCloser, ShutdownCoordinator, ShutdownReport};
