//! Shared application state for the conduit server

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use conduit_core::{
    DEFAULT_CHANNEL_CAPACITY, HandlerSet, RequestRouter, SessionLifecycleManager, SessionRegistry,
};

use crate::transport::TransportKind;

/// Interval between SSE keep-alive comments
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);
/// How long an initialized streamable session may wait for its `GET`
pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a POST waits for room in a full session buffer
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Live sessions, shared by the lifecycle manager and the router
    pub registry: Arc<SessionRegistry>,
    /// Opens and closes sessions
    pub lifecycle: Arc<SessionLifecycleManager>,
    /// Routes correlated messages to the handler set
    pub router: Arc<RequestRouter>,
    /// Transport serving client streams
    pub transport: TransportKind,
    /// Frames buffered per session before writers wait
    pub channel_capacity: usize,
    /// SSE keep-alive interval
    pub keep_alive: Duration,
    /// Deadline for attaching a parked streamable session
    pub attach_timeout: Duration,
    /// Bound on a POST handler's wait to queue a response frame
    pub write_timeout: Duration,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state with a fresh registry serving `handlers`
    pub fn new(handlers: Arc<HandlerSet>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Arc::new(SessionLifecycleManager::new(Arc::clone(&registry)));
        Self::with_components(lifecycle, handlers)
    }

    /// Create state around an existing lifecycle manager (for testing)
    pub fn with_components(
        lifecycle: Arc<SessionLifecycleManager>,
        handlers: Arc<HandlerSet>,
    ) -> Self {
        let registry = Arc::clone(lifecycle.registry());
        let router = Arc::new(RequestRouter::new(Arc::clone(&registry), handlers));
        Self {
            registry,
            lifecycle,
            router,
            transport: TransportKind::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            keep_alive: DEFAULT_KEEP_ALIVE,
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            started_at: Utc::now(),
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set the per-session buffer; a capacity of zero is raised to one
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
