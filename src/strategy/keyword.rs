//! Keyword heuristic over free-form advice.
//!
//! Everything is matched against the lower-cased text and the first match
//! wins; no attempt is made to tie a number to the sentence that carries
//! the recommendation.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

use super::AdviceParser;
use crate::types::{OrderKind, Side, TradeInstruction};

pub const DEFAULT_QUANTITY: u32 = 100;

#[allow(clippy::expect_used)]
fn quantity_regex() -> &'static Regex {
    static QUANTITY: OnceLock<Regex> = OnceLock::new();
    QUANTITY.get_or_init(|| Regex::new(r"(\d+)\s*shares").expect("valid quantity regex"))
}

#[allow(clippy::expect_used)]
fn price_regex() -> &'static Regex {
    static PRICE: OnceLock<Regex> = OnceLock::new();
    PRICE.get_or_init(|| Regex::new(r"\bat\s*\$?(\d+(?:\.\d+)?)").expect("valid price regex"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordParser;

impl KeywordParser {
    pub fn new() -> Self {
        Self
    }

    /// First integer directly followed by "shares". Zero and overflow count
    /// as absent.
    fn quantity(lower: &str) -> Option<u32> {
        let caps = quantity_regex().captures(lower)?;
        caps.get(1)?.as_str().parse::<u32>().ok().filter(|q| *q > 0)
    }

    /// First "at $<number>" (the dollar sign is optional).
    fn quoted_price(lower: &str) -> Option<Decimal> {
        let caps = price_regex().captures(lower)?;
        Decimal::from_str(caps.get(1)?.as_str()).ok()
    }
}

impl AdviceParser for KeywordParser {
    fn parse(&self, entity_id: &str, advice: &str, latest_price: Option<Decimal>) -> Option<TradeInstruction> {
        let lower = advice.to_lowercase();

        let side = if lower.contains("buy") {
            Side::Buy
        } else if lower.contains("sell") {
            Side::Sell
        } else {
            return None;
        };

        let kind = if lower.contains("limit") {
            OrderKind::Limit
        } else {
            OrderKind::Market
        };

        let quantity = Self::quantity(&lower).unwrap_or_else(|| {
            debug!(entity = %entity_id, "No quantity in advice, using default");
            DEFAULT_QUANTITY
        });

        let price = match (Self::quoted_price(&lower), kind) {
            (Some(p), _) => Some(p),
            (None, OrderKind::Limit) => {
                debug!(
                    entity = %entity_id,
                    fallback = ?latest_price,
                    "No price in advice for limit order, using latest market price"
                );
                latest_price
            }
            (None, OrderKind::Market) => None,
        };

        Some(TradeInstruction {
            entity_id: entity_id.to_string(),
            side,
            quantity,
            kind,
            price,
        })
    }
}
