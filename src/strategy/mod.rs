//! Advice interpretation.
//!
//! Turns free-form advisory text into a `TradeInstruction`, or nothing.
//! Kept behind the `AdviceParser` trait so the keyword heuristic can be
//! swapped for a structured-output contract without touching the pipeline.

pub mod keyword;

use rust_decimal::Decimal;

use crate::types::TradeInstruction;

pub use keyword::KeywordParser;

pub trait AdviceParser: Send + Sync {
    /// `latest_price` is the entity's most recent tick price, used only as
    /// the fallback for a limit order whose advice quoted no price.
    fn parse(&self, entity_id: &str, advice: &str, latest_price: Option<Decimal>) -> Option<TradeInstruction>;
}
