//! Order venue integration.
//!
//! Defines the wire shape of an order and the `OrderGateway` trait that
//! delivers it. The executor interprets the response; gateways only move
//! bytes.

pub mod exchange;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderKind, Side};

/// `POST /order` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderKind,
    pub side: Side,
    pub quantity: u32,
    /// Always present on the wire, `null` when unset.
    pub price: Option<Decimal>,
    pub username: String,
}

/// Raw response from the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

/// Abstraction over order endpoints.
///
/// `Err` means no response was received at all (connect failure, timeout).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit(&self, order: &OrderRequest) -> Result<GatewayResponse>;
}
