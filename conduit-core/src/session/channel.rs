//! Server-to-client stream channel
//!
//! A [`StreamChannel`] owns the sending half of a bounded mpsc channel. The
//! transport that accepted the connection holds the receiving half and turns
//! it into the response body, so dropping that body (peer disconnect) is
//! observable here through [`StreamChannel::disconnected`].

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ChannelError;
use crate::jsonrpc::{JsonRpcMessage, JsonRpcResponse};

use super::SessionId;

/// Default buffer between a session's writers and its HTTP body
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// One outbound server-sent frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Where the client should POST its messages (legacy SSE handshake)
    Endpoint(String),
    /// A JSON-RPC message pushed to the client
    Message(JsonRpcMessage),
}

impl Frame {
    /// SSE event name for this frame
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Endpoint(_) => "endpoint",
            Self::Message(_) => "message",
        }
    }

    /// SSE data payload for this frame
    pub fn encode(&self) -> Result<String, ChannelError> {
        match self {
            Self::Endpoint(url) => Ok(url.clone()),
            Self::Message(msg) => Ok(serde_json::to_string(msg)?),
        }
    }
}

impl From<JsonRpcResponse> for Frame {
    fn from(resp: JsonRpcResponse) -> Self {
        Self::Message(JsonRpcMessage::Response(resp))
    }
}

/// Write/close handle onto one client's open stream
#[derive(Debug)]
pub struct StreamChannel {
    session_id: SessionId,
    sink: Mutex<Option<mpsc::Sender<Frame>>>,
    closed: CancellationToken,
}

impl StreamChannel {
    /// Wrap the sending half of a session's stream
    pub fn new(session_id: SessionId, sink: mpsc::Sender<Frame>) -> Self {
        Self {
            session_id,
            sink: Mutex::new(Some(sink)),
            closed: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn current_sink(&self) -> Option<mpsc::Sender<Frame>> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Queue a frame for the client
    ///
    /// Fails with [`ChannelError::Closed`] once the channel has been closed or
    /// the receiving side is gone. A write blocked on a full buffer is aborted
    /// by a concurrent [`close`](Self::close).
    pub async fn write(&self, frame: Frame) -> Result<(), ChannelError> {
        let sink = self.current_sink().ok_or(ChannelError::Closed)?;
        trace!(session_id = %self.session_id, event = frame.event_name(), "writing frame");

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ChannelError::Closed),
            sent = sink.send(frame) => sent.map_err(|_| ChannelError::Closed),
        }
    }

    /// Release the sending half; the client's stream ends once drained
    ///
    /// Closing an already-closed channel is a no-op.
    pub fn close(&self) {
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.cancel();
        drop(sink);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
            || self
                .current_sink()
                .map(|sink| sink.is_closed())
                .unwrap_or(true)
    }

    /// Resolves when the peer has gone away or the channel was closed
    pub async fn disconnected(&self) {
        let Some(sink) = self.current_sink() else {
            return;
        };

        tokio::select! {
            _ = sink.closed() => {}
            _ = self.closed.cancelled() => {}
        }
    }
}
