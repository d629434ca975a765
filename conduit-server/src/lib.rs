//! conduit-server - HTTP server for the conduit MCP bridge
//!
//! This crate mounts one of the stream transports plus a small admin API on
//! an axum router, and ties the server's graceful shutdown to the
//! [`ShutdownCoordinator`] sweep so open streams end before the server drains.

mod error;
pub mod http;
mod state;
pub mod transport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use conduit_core::{
    DEFAULT_CHANNEL_CAPACITY, HandlerSet, SessionCloser, ShutdownCoordinator, ShutdownReport,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub use error::ServerError;
pub use http::create_router;
pub use state::{AppState, DEFAULT_ATTACH_TIMEOUT, DEFAULT_KEEP_ALIVE, DEFAULT_WRITE_TIMEOUT};
pub use transport::{StreamTransport, TransportKind, transport_for};

/// The main conduit server
pub struct ConduitServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ConduitServer {
    /// Create a server with fresh state serving `handlers`
    pub fn new(config: ServerConfig, handlers: Arc<HandlerSet>) -> Self {
        let state = AppState::new(handlers);
        Self::with_state(config, state)
    }

    /// Create a server around existing state (for testing)
    ///
    /// The transport and channel capacity from `config` override the state's.
    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        let state = state
            .with_transport(config.transport)
            .with_channel_capacity(config.channel_capacity);
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<ShutdownReport, ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        self.run_until(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    ///
    /// When `shutdown` completes, every live session is closed before the
    /// server stops accepting and drains in-flight requests. The sweep's
    /// report is returned once draining finishes.
    pub async fn run_until<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<ShutdownReport, ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!(
            transport = %self.config.transport,
            "conduit server listening on {}",
            local
        );

        let transport = transport_for(self.config.transport);
        let router = create_router(Arc::clone(&self.state), transport.as_ref());

        let closer: Arc<dyn SessionCloser> = self.state.lifecycle.clone();
        let coordinator =
            ShutdownCoordinator::new(closer).with_timeout(self.config.shutdown_timeout);
        let (report_tx, report_rx) = oneshot::channel();

        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown requested");
                let report = coordinator.sweep().await;
                let _ = report_tx.send(report);
            })
            .await
            .map_err(ServerError::Serve)?;

        let report = report_rx.await.unwrap_or_default();
        tracing::info!(
            closed = report.closed.len(),
            failed = report.failed.len(),
            "conduit server stopped"
        );
        Ok(report)
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Stream transport to mount
    pub transport: TransportKind,
    /// Frames buffered per session
    pub channel_capacity: usize,
    /// Bound on closing any one session during shutdown
    pub shutdown_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            transport: TransportKind::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            shutdown_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Returns the socket address string (e.g., "127.0.0.1:3000")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
