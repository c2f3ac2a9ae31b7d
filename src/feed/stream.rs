//! Reconnecting WebSocket client for one feed.
//!
//! A `StreamConnection` owns nothing but its address and settings; each
//! session connects, reads frames one at a time, and hands decoded messages
//! to the handler. `run` wraps sessions in an unbounded retry loop with a
//! fixed delay: no backoff growth, no jitter, never gives up.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use super::{FeedKind, FeedMessage, MessageHandler};
use crate::config::{DecodeErrorPolicy, FeedsConfig};
use crate::types::ScoutError;

/// Connection behaviour shared by both feeds.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub decode_error_policy: DecodeErrorPolicy,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from(&FeedsConfig::default())
    }
}

impl From<&FeedsConfig> for StreamSettings {
    fn from(cfg: &FeedsConfig) -> Self {
        Self {
            reconnect_delay: cfg.reconnect_delay(),
            connect_timeout: cfg.connect_timeout(),
            decode_error_policy: cfg.decode_error_policy,
        }
    }
}

/// Why a session ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server sent a Close frame.
    ClosedByServer,
    /// The stream ended without a Close frame.
    StreamEnded,
    /// A malformed message under `DecodeErrorPolicy::Reconnect`.
    DecodeError,
}

pub struct StreamConnection {
    name: String,
    url: String,
    kind: FeedKind,
    settings: StreamSettings,
    attempts: AtomicU64,
}

impl StreamConnection {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: FeedKind, settings: StreamSettings) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            settings,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Total connection attempts made so far, across all sessions.
    pub fn connection_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Keep the feed connected for as long as the future is polled.
    /// Never returns.
    pub async fn run(&self, handler: &dyn MessageHandler) {
        loop {
            match self.run_session(handler).await {
                Ok(end) => {
                    info!(feed = %self.name, ?end, "Feed session ended, reconnecting");
                }
                Err(e) => {
                    warn!(
                        feed = %self.name,
                        attempts = self.connection_attempts(),
                        error = %e,
                        "Feed session failed, reconnecting"
                    );
                }
            }
            tokio::time::sleep(self.settings.reconnect_delay).await;
        }
    }

    /// One connect + read loop. Returns when the session ends for any reason.
    pub async fn run_session(&self, handler: &dyn MessageHandler) -> Result<SessionEnd> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(feed = %self.name, url = %self.url, attempt, "Connecting");

        let connect = tokio::time::timeout(self.settings.connect_timeout, connect_async(self.url.as_str()));
        let (mut ws, response) = match connect.await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(self.connection_error(e.to_string()).into()),
            Err(_) => {
                return Err(self
                    .connection_error(format!("connect timed out after {:?}", self.settings.connect_timeout))
                    .into())
            }
        };
        info!(feed = %self.name, status = %response.status(), attempt, "Connected to feed");

        while let Some(frame) = ws.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => return Err(self.connection_error(e.to_string()).into()),
            };

            let raw = match frame {
                Message::Text(text) => text,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        if self.on_decode_error(&e.to_string()) {
                            let _ = ws.close(None).await;
                            return Ok(SessionEnd::DecodeError);
                        }
                        continue;
                    }
                },
                Message::Ping(data) => {
                    trace!(feed = %self.name, "Ping");
                    ws.send(Message::Pong(data))
                        .await
                        .map_err(|e| self.connection_error(e.to_string()))?;
                    continue;
                }
                Message::Close(frame) => {
                    info!(feed = %self.name, frame = ?frame, "Feed closed by server");
                    return Ok(SessionEnd::ClosedByServer);
                }
                _ => continue,
            };

            match FeedMessage::decode(self.kind, &raw) {
                Ok(Some(message)) => {
                    if let Err(e) = handler.handle(message).await {
                        let _ = ws.close(None).await;
                        return Err(e).with_context(|| format!("Handler failed on feed {}", self.name));
                    }
                }
                Ok(None) => trace!(feed = %self.name, bytes = raw.len(), "Ignoring message of unhandled type"),
                Err(e) => {
                    if self.on_decode_error(&e.to_string()) {
                        let _ = ws.close(None).await;
                        return Ok(SessionEnd::DecodeError);
                    }
                }
            }
        }

        Ok(SessionEnd::StreamEnded)
    }

    /// Log a decode failure; returns whether the session should end.
    fn on_decode_error(&self, message: &str) -> bool {
        let err = ScoutError::ProtocolDecode {
            feed: self.name.clone(),
            message: message.to_string(),
        };
        match self.settings.decode_error_policy {
            DecodeErrorPolicy::Skip => {
                warn!(error = %err, "Dropping malformed message");
                false
            }
            DecodeErrorPolicy::Reconnect => {
                warn!(error = %err, "Malformed message, restarting session");
                true
            }
        }
    }

    fn connection_error(&self, message: String) -> ScoutError {
        ScoutError::Connection {
            feed: self.name.clone(),
            message,
        }
    }
}
