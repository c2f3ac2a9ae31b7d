//! Live feed ingestion.
//!
//! Defines the wire envelope shared by both feeds, the `MessageHandler`
//! trait the pipeline implements, and the reconnecting `StreamConnection`.

pub mod stream;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::types::{EventRecord, MarketTick};

/// Which feed a connection is attached to. Each feed only accepts its own
/// message type; anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Market,
    Events,
}

impl FeedKind {
    /// The envelope `type` this feed carries.
    pub fn message_type(&self) -> &'static str {
        match self {
            FeedKind::Market => "market_data",
            FeedKind::Events => "player_event",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Market => write!(f, "market"),
            FeedKind::Events => write!(f, "events"),
        }
    }
}

/// A decoded, known-type feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    MarketData(MarketTick),
    PlayerEvent(EventRecord),
}

/// `{ "type": ..., "data": ... }`
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed {message_type} payload: {source}")]
    Payload {
        message_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl FeedMessage {
    /// Decode one raw frame for the given feed.
    ///
    /// `Ok(None)` means the frame was well-formed but of a type this feed
    /// does not handle.
    pub fn decode(kind: FeedKind, raw: &str) -> Result<Option<FeedMessage>, DecodeError> {
        let envelope: Envelope = serde_json::from_str(raw).map_err(DecodeError::Envelope)?;
        if envelope.kind != kind.message_type() {
            return Ok(None);
        }

        let payload_err = |source: serde_json::Error| DecodeError::Payload {
            message_type: kind.message_type(),
            source,
        };
        let message = match kind {
            FeedKind::Market => {
                FeedMessage::MarketData(serde_json::from_value(envelope.data).map_err(payload_err)?)
            }
            FeedKind::Events => {
                FeedMessage::PlayerEvent(serde_json::from_value(envelope.data).map_err(payload_err)?)
            }
        };
        Ok(Some(message))
    }

    pub fn entity_id(&self) -> &str {
        match self {
            FeedMessage::MarketData(t) => &t.player,
            FeedMessage::PlayerEvent(e) => &e.player,
        }
    }
}

/// Receives decoded messages. A connection awaits each call before reading
/// the next frame; an `Err` tears the session down and forces a reconnect.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: FeedMessage) -> Result<()>;
}
