//! Minimal SSE client for transport testing
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

/// One parsed server-sent event
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    /// Parse the data field as JSON
    #[allow(dead_code)]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.data).expect("event data is not JSON")
    }
}

/// Reads events from a streaming `text/event-stream` response
pub struct SseClient {
    response: reqwest::Response,
    buffer: String,
}

impl SseClient {
    /// Open a stream with a plain GET
    #[allow(dead_code)]
    pub async fn connect(url: &str) -> Self {
        Self::from_request(reqwest::Client::new().get(url)).await
    }

    /// Open a stream with one extra request header
    #[allow(dead_code)]
    pub async fn connect_with_header(url: &str, name: &str, value: &str) -> Self {
        Self::from_request(reqwest::Client::new().get(url).header(name, value)).await
    }

    async fn from_request(request: reqwest::RequestBuilder) -> Self {
        let response = request.send().await.expect("Failed to connect");
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(
            content_type.starts_with("text/event-stream"),
            "unexpected content type {}",
            content_type
        );
        Self {
            response,
            buffer: String::new(),
        }
    }

    /// Next event with data, skipping keep-alive comments
    ///
    /// Returns `None` once the server ends the stream.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
                continue;
            }

            match self.response.chunk().await {
                Ok(Some(bytes)) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Next event, panicking if none arrives within `limit`
    #[allow(dead_code)]
    pub async fn expect_event(&mut self, limit: Duration) -> SseEvent {
        tokio::time::timeout(limit, self.next_event())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
    }

    /// Wait for the server to end the stream, skipping any events
    #[allow(dead_code)]
    pub async fn expect_end(&mut self, limit: Duration) {
        tokio::time::timeout(limit, async {
            while self.next_event().await.is_some() {}
        })
        .await
        .expect("stream did not end in time");
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = value.strip_prefix(' ').unwrap_or(value).to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}
