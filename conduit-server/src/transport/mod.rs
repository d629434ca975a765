//! Client stream transports
//!
//! Both transports share the [`AppState`] lifecycle manager and router; they
//! differ only in how a stream is opened and how messages are correlated.

mod sse;
mod streamable;

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::response::sse::{Event, KeepAlive, Sse};
use conduit_core::Frame;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::AppState;

pub use sse::{MESSAGES_PATH, SSE_PATH, SseTransport};
pub use streamable::{MCP_PATH, SESSION_ID_HEADER, StreamableHttpTransport};

/// Which stream protocol the server speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Legacy HTTP+SSE: `GET /sse` plus `POST /messages?sessionId=`
    #[default]
    Sse,
    /// Streamable HTTP: a single `/mcp` endpoint keyed by header
    StreamableHttp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable-http",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sse" => Ok(Self::Sse),
            "streamable-http" | "streamable_http" | "http" => Ok(Self::StreamableHttp),
            other => Err(format!(
                "unknown transport '{}', expected 'sse' or 'streamable-http'",
                other
            )),
        }
    }
}

/// A way of carrying sessions over HTTP
pub trait StreamTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Routes this transport mounts on the server
    fn routes(&self) -> Router<Arc<AppState>>;
}

/// Build the transport selected by `kind`
pub fn transport_for(kind: TransportKind) -> Box<dyn StreamTransport> {
    match kind {
        TransportKind::Sse => Box::new(SseTransport),
        TransportKind::StreamableHttp => Box::new(StreamableHttpTransport::new()),
    }
}

/// Convert an outbound frame into an SSE event
fn frame_event(frame: Frame) -> Result<Event, Infallible> {
    let event = match frame.encode() {
        Ok(data) => Event::default().event(frame.event_name()).data(data),
        Err(e) => {
            warn!("Dropping frame that failed to encode: {}", e);
            Event::default().comment("encode error")
        }
    };
    Ok(event)
}

/// Stream a session's frames to the client until its channel closes
///
/// The body owns `rx`; when the client goes away the body is dropped and the
/// session's disconnect watcher reaps it.
fn sse_stream(
    rx: mpsc::Receiver<Frame>,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(ReceiverStream::new(rx).map(frame_event))
        .keep_alive(KeepAlive::new().interval(keep_alive))
}
