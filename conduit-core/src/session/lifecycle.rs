//! Session lifecycle management
//!
//! Creates sessions for accepted streams and tears them down. Peer
//! disconnect, administrative close and the shutdown sweep all converge on
//! [`SessionLifecycleManager::close_session`]: the registry entry is removed
//! under its write lock first, so only one caller ever goes on to close the
//! channel and fire the notifier.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{CloseError, RegistryError};
use crate::shutdown::SessionCloser;

use super::{
    CloseReason, Frame, IdGenerator, Session, SessionId, SessionRegistry, StreamChannel,
    UuidIdGenerator,
};

/// Attempts at minting an unused id before giving up
const MAX_ID_ATTEMPTS: usize = 16;

/// Capacity of the lifecycle event broadcast
const EVENT_CAPACITY: usize = 256;

/// Lifecycle notifications published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened { id: SessionId },
    Closed { id: SessionId, reason: CloseReason },
}

/// Listing entry for a live session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub transport: &'static str,
    pub created_at: DateTime<Utc>,
}

/// Creates, tracks and closes sessions
pub struct SessionLifecycleManager {
    registry: Arc<SessionRegistry>,
    ids: Arc<dyn IdGenerator>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionLifecycleManager {
    /// Create a manager minting random UUID session ids
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_id_generator(registry, Arc::new(UuidIdGenerator))
    }

    /// Create a manager with a custom id source
    pub fn with_id_generator(registry: Arc<SessionRegistry>, ids: Arc<dyn IdGenerator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            registry,
            ids,
            events,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Subscribe to open/close notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Open a session around the sending half of a client stream
    ///
    /// Returns the new id once the session is resolvable in the registry.
    pub async fn create_session(
        self: &Arc<Self>,
        transport: &'static str,
        sink: mpsc::Sender<Frame>,
    ) -> Result<SessionId, RegistryError> {
        let (session, _closed) = self.register(transport, sink).await?;
        Ok(session.id().clone())
    }

    /// Open a session and receive its close reason once it is torn down
    pub async fn create_session_with_notify(
        self: &Arc<Self>,
        transport: &'static str,
        sink: mpsc::Sender<Frame>,
    ) -> Result<(SessionId, oneshot::Receiver<CloseReason>), RegistryError> {
        let (session, closed) = self.register(transport, sink).await?;
        Ok((session.id().clone(), closed))
    }

    async fn register(
        self: &Arc<Self>,
        transport: &'static str,
        sink: mpsc::Sender<Frame>,
    ) -> Result<(Arc<Session>, oneshot::Receiver<CloseReason>), RegistryError> {
        let mut last_err = None;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            let (notify_tx, notify_rx) = oneshot::channel();
            let channel = StreamChannel::new(id.clone(), sink.clone());
            let session = Arc::new(Session::new(id, channel, transport, Some(notify_tx)));

            match self.registry.insert(Arc::clone(&session)).await {
                Ok(()) => {
                    info!(session_id = %session.id(), transport, "session opened");
                    self.watch_disconnect(&session);
                    let _ = self.events.send(SessionEvent::Opened {
                        id: session.id().clone(),
                    });
                    return Ok((session, notify_rx));
                }
                Err(err) => {
                    warn!("Session id collision, retrying: {}", err);
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| RegistryError::DuplicateSession(self.ids.next_id())))
    }

    /// Reap the session when its peer goes away without an explicit close
    fn watch_disconnect(self: &Arc<Self>, session: &Arc<Session>) {
        let manager: Weak<Self> = Arc::downgrade(self);
        let session = Arc::clone(session);

        tokio::spawn(async move {
            session.channel().disconnected().await;

            let Some(manager) = manager.upgrade() else {
                return;
            };
            if manager.registry.remove_entry(&session).await.is_some() {
                manager.finish(&session, CloseReason::Disconnected);
            }
        });
    }

    /// Close a session if it is open
    ///
    /// Unknown or already-closed ids are a no-op. Returns whether this call
    /// performed the close.
    pub async fn close_session(&self, id: &SessionId, reason: CloseReason) -> bool {
        match self.registry.remove(id).await {
            Some(session) => {
                self.finish(&session, reason);
                true
            }
            None => {
                debug!(session_id = %id, %reason, "close requested for unknown session");
                false
            }
        }
    }

    fn finish(&self, session: &Session, reason: CloseReason) {
        session.finish(reason);
        info!(session_id = %session.id(), %reason, "session closed");
        let _ = self.events.send(SessionEvent::Closed {
            id: session.id().clone(),
            reason,
        });
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.registry.get(id).await
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.registry.contains(id).await
    }

    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// List live sessions, oldest first
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> = self
            .registry
            .sessions()
            .await
            .into_iter()
            .map(|session| SessionSummary {
                id: session.id().clone(),
                transport: session.transport(),
                created_at: session.created_at(),
            })
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        sessions
    }
}

#[async_trait]
impl SessionCloser for SessionLifecycleManager {
    async fn live_sessions(&self) -> Vec<SessionId> {
        self.registry.ids().await
    }

    async fn close(&self, id: &SessionId) -> Result<(), CloseError> {
        self.close_session(id, CloseReason::Shutdown).await;
        Ok(())
    }
}
