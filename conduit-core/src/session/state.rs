//! Session record

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{SessionId, StreamChannel};

/// Why a session was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client's stream went away
    Disconnected,
    /// Administrative or client-requested close
    Explicit,
    /// Process shutdown sweep
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Explicit => "explicit",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Open,
    Closed,
}

/// Server-side record binding one client stream to an identifier
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    channel: StreamChannel,
    transport: &'static str,
    created_at: DateTime<Utc>,
    close_notify: Mutex<Option<oneshot::Sender<CloseReason>>>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        channel: StreamChannel,
        transport: &'static str,
        close_notify: Option<oneshot::Sender<CloseReason>>,
    ) -> Self {
        Self {
            id,
            channel,
            transport,
            created_at: Utc::now(),
            close_notify: Mutex::new(close_notify),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn channel(&self) -> &StreamChannel {
        &self.channel
    }

    /// Label of the transport that opened this session
    pub fn transport(&self) -> &'static str {
        self.transport
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        if self.channel.is_closed() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    /// Close the channel and fire the close notifier
    ///
    /// Only the lifecycle manager calls this, after removing the session from
    /// the registry, so it runs once per session.
    pub(crate) fn finish(&self, reason: CloseReason) {
        self.channel.close();
        let notify = self
            .close_notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = notify {
            // The owner may have stopped listening
            let _ = tx.send(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session_with_notify() -> (Session, oneshot::Receiver<CloseReason>) {
        let (tx, _rx) = mpsc::channel(1);
        let (notify_tx, notify_rx) = oneshot::channel();
        let id = SessionId::from("s1");
        let channel = StreamChannel::new(id.clone(), tx);
        (Session::new(id, channel, "sse", Some(notify_tx)), notify_rx)
    }

    #[test]
    fn close_reason_displays_snake_case() {
        assert_eq!(CloseReason::Disconnected.to_string(), "disconnected");
        assert_eq!(CloseReason::Shutdown.to_string(), "shutdown");
    }

    #[tokio::test]
    async fn finish_closes_channel_and_notifies() {
        let (session, notify_rx) = session_with_notify();

        session.finish(CloseReason::Explicit);

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(notify_rx.await.unwrap(), CloseReason::Explicit);
    }

    #[tokio::test]
    async fn finish_twice_notifies_once() {
        let (session, notify_rx) = session_with_notify();

        session.finish(CloseReason::Shutdown);
        session.finish(CloseReason::Explicit);

        assert_eq!(notify_rx.await.unwrap(), CloseReason::Shutdown);
    }
}
