//! Shutdown sweep over live sessions

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::CloseError;
use crate::session::SessionId;

/// Something that owns sessions and can close them one at a time
#[async_trait]
pub trait SessionCloser: Send + Sync {
    /// Snapshot of the sessions currently open
    async fn live_sessions(&self) -> Vec<SessionId>;

    /// Close one session
    async fn close(&self, id: &SessionId) -> Result<(), CloseError>;
}

/// Outcome of a shutdown sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions closed cleanly
    pub closed: Vec<SessionId>,
    /// Sessions whose close failed or timed out
    pub failed: Vec<(SessionId, CloseError)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.closed.len() + self.failed.len()
    }
}

/// Closes every live session on process termination
pub struct ShutdownCoordinator {
    closer: Arc<dyn SessionCloser>,
    per_session_timeout: Option<Duration>,
}

impl ShutdownCoordinator {
    pub fn new(closer: Arc<dyn SessionCloser>) -> Self {
        Self {
            closer,
            per_session_timeout: None,
        }
    }

    /// Bound each individual close; `None` waits as long as it takes
    pub fn with_timeout(mut self, per_session_timeout: Option<Duration>) -> Self {
        self.per_session_timeout = per_session_timeout;
        self
    }

    /// Close all sessions that were live when the sweep started
    ///
    /// A failing session is logged and recorded; the sweep always continues
    /// to the next one.
    pub async fn sweep(&self) -> ShutdownReport {
        let ids = self.closer.live_sessions().await;
        info!("Shutting down {} session(s)", ids.len());

        let mut report = ShutdownReport::default();
        for id in ids {
            info!(session_id = %id, "closing session for shutdown");
            match self.close_one(&id).await {
                Ok(()) => report.closed.push(id),
                Err(e) => {
                    error!(session_id = %id, "Error closing session: {}", e);
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failed.len(),
            "Shutdown sweep complete"
        );
        report
    }

    async fn close_one(&self, id: &SessionId) -> Result<(), CloseError> {
        match self.per_session_timeout {
            Some(limit) => tokio::time::timeout(limit, self.closer.close(id))
                .await
                .map_err(|_| CloseError::TimedOut(id.clone()))?,
            None => self.closer.close(id).await,
        }
    }
}
