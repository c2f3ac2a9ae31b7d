//! HTTP order endpoint.
//!
//! Posts JSON orders to the trading server's `/order` route. One attempt
//! per order, bounded by the client timeout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{GatewayResponse, OrderGateway, OrderRequest};

pub struct HttpOrderGateway {
    http: Client,
    endpoint: String,
}

impl HttpOrderGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build order HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    async fn submit(&self, order: &OrderRequest) -> Result<GatewayResponse> {
        debug!(endpoint = %self.endpoint, symbol = %order.symbol, "POST order");

        let response = self
            .http
            .post(&self.endpoint)
            .json(order)
            .send()
            .await
            .with_context(|| format!("Order request to {} failed", self.endpoint))?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %self.endpoint, status, error = %e, "Failed to read order response body");
                format!("<unreadable response body: {e}>")
            }
        };
        Ok(GatewayResponse { status, body })
    }
}
