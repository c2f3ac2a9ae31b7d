//! Order submission.
//!
//! Resolves the instruction's symbol, builds the wire order, and sends it
//! through an `OrderGateway`. Only HTTP 201 counts as accepted; anything
//! else, transport failures included, is a rejection. Never retries and
//! never returns an error: the verdict is always an `OrderResult`.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::platforms::{OrderGateway, OrderRequest};
use crate::state::EntityStateStore;
use crate::types::{OrderKind, OrderResult, ScoutError, TradeInstruction};

const HTTP_CREATED: u16 = 201;

pub struct OrderSubmitter {
    gateway: Arc<dyn OrderGateway>,
    store: Arc<EntityStateStore>,
    username: String,
    dry_run: bool,
    cooldown: Duration,
}

impl OrderSubmitter {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        store: Arc<EntityStateStore>,
        username: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            username: username.into(),
            dry_run: false,
            cooldown,
        }
    }

    /// Log orders instead of sending them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Registered symbol for the entity, or the entity id itself.
    pub fn resolve_symbol(&self, entity_id: &str) -> String {
        self.store
            .get_symbol(entity_id)
            .unwrap_or_else(|| entity_id.to_string())
    }

    pub fn build_request(&self, instruction: &TradeInstruction) -> OrderRequest {
        OrderRequest {
            symbol: self.resolve_symbol(&instruction.entity_id),
            order_type: instruction.kind,
            side: instruction.side,
            quantity: instruction.quantity,
            price: instruction.price,
            username: self.username.clone(),
        }
    }

    /// Submit one instruction, then sit out the cool-down.
    pub async fn submit(&self, instruction: &TradeInstruction) -> OrderResult {
        let request = self.build_request(instruction);
        info!(
            entity = %instruction.entity_id,
            symbol = %request.symbol,
            side = %request.side,
            order_type = %request.order_type,
            quantity = request.quantity,
            price = ?request.price,
            dry_run = self.dry_run,
            "Sending order"
        );

        let result = if self.dry_run {
            OrderResult::accepted(None, "dry run: order not sent")
        } else {
            self.send(&request).await
        };

        if result.accepted {
            match (request.order_type, request.price) {
                (OrderKind::Limit, Some(price)) => info!(
                    entity = %instruction.entity_id,
                    "Limit order placed: {} {} shares at ${:.2}",
                    request.side, request.quantity, price
                ),
                _ => info!(
                    entity = %instruction.entity_id,
                    "{} order placed: {} {} shares",
                    request.order_type, request.side, request.quantity
                ),
            }
        } else {
            let err = ScoutError::OrderRejected(result.to_string());
            warn!(entity = %instruction.entity_id, symbol = %request.symbol, error = %err, "Failed to place order");
        }

        tokio::time::sleep(self.cooldown).await;
        result
    }

    async fn send(&self, request: &OrderRequest) -> OrderResult {
        match self.gateway.submit(request).await {
            Ok(response) if response.status == HTTP_CREATED => {
                OrderResult::accepted(Some(response.status), response.body)
            }
            Ok(response) => OrderResult::rejected(Some(response.status), response.body),
            Err(e) => OrderResult::rejected(None, format!("{e:#}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
