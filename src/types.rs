//! Shared types for the SCOUT agent.
//!
//! These types form the data model used across all modules: feed
//! observations, trade instructions, and order results.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Feed observations
// ---------------------------------------------------------------------------

/// Timestamp as sent by a feed. Feeds are not consistent about the format,
/// so anything reasonable is accepted and echoed back verbatim in prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedTimestamp {
    DateTime(DateTime<Utc>),
    Epoch(f64),
    Text(String),
}

impl fmt::Display for FeedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedTimestamp::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FeedTimestamp::Epoch(secs) => write!(f, "{secs}"),
            FeedTimestamp::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A price observation from the market feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    /// Entity identifier (the player).
    pub player: String,
    pub symbol: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<FeedTimestamp>,
    /// Any other fields the feed attached (volume, change, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Display for MarketTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] @ ${:.2}", self.player, self.symbol, self.price)
    }
}

/// A news/performance event from the events feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Entity identifier (the player).
    pub player: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<FeedTimestamp>,
    /// Free-form description/category fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventRecord {
    /// Human-readable description, if the feed supplied one.
    pub fn description(&self) -> Option<&str> {
        self.fields.get("description").and_then(Value::as_str)
    }
}

/// Either kind of observation, as appended to an entity's history.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Tick(MarketTick),
    Event(EventRecord),
}

impl Observation {
    pub fn entity_id(&self) -> &str {
        match self {
            Observation::Tick(t) => &t.player,
            Observation::Event(e) => &e.player,
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Market or limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
    Limit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
        }
    }
}

/// A structured, actionable order derived from advisory text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInstruction {
    pub entity_id: String,
    pub side: Side,
    pub quantity: u32,
    pub kind: OrderKind,
    /// Quoted in the advice, or the latest tick price for a limit order
    /// that quoted none. Never filled in for a market order.
    pub price: Option<Decimal>,
}

impl fmt::Display for TradeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} x{}", self.kind, self.side, self.entity_id, self.quantity)?;
        if let Some(p) = self.price {
            write!(f, " @ ${p:.2}")?;
        }
        Ok(())
    }
}

/// Outcome of an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub accepted: bool,
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    pub diagnostic: String,
}

impl OrderResult {
    pub fn accepted(status: Option<u16>, diagnostic: impl Into<String>) -> Self {
        Self {
            accepted: true,
            status,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn rejected(status: Option<u16>, diagnostic: impl Into<String>) -> Self {
        Self {
            accepted: false,
            status,
            diagnostic: diagnostic.into(),
        }
    }
}

impl fmt::Display for OrderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.accepted { "ACCEPTED" } else { "REJECTED" };
        match self.status {
            Some(s) => write!(f, "{verdict} (HTTP {s}): {}", self.diagnostic),
            None => write!(f, "{verdict}: {}", self.diagnostic),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SCOUT.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("Connection failure ({feed}): {message}")]
    Connection { feed: String, message: String },

    #[error("Protocol decode error ({feed}): {message}")]
    ProtocolDecode { feed: String, message: String },

    #[error("Advisory error ({provider}): {message}")]
    Advisory { provider: String, message: String },

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
