//! Observation pipeline.
//!
//! Receives decoded feed messages, appends them to the state store, and runs
//! the analysis cycle inline whenever the trigger fires:
//! snapshot → advisory call → parse → order submission.
//!
//! Each feed connection awaits `handle` before reading its next frame, so a
//! cycle delays that feed only. Two feeds can still run cycles for the same
//! entity at once; `OverlapPolicy` decides whether that is allowed.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::executor::OrderSubmitter;
use super::trigger::{AnalysisSnapshot, AnalysisTrigger};
use crate::config::OverlapPolicy;
use crate::feed::{FeedMessage, MessageHandler};
use crate::llm::AdvisoryClient;
use crate::state::EntityStateStore;
use crate::strategy::AdviceParser;
use crate::types::{Observation, OrderResult};

// ---------------------------------------------------------------------------
// Outcomes and counters
// ---------------------------------------------------------------------------

/// How one analysis cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The advice recommended neither buying nor selling.
    NoAction,
    /// The advisory call failed; nothing was submitted.
    AdvisoryFailed,
    Submitted(OrderResult),
    /// Another cycle for the entity was already running.
    SkippedInFlight,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::NoAction => write!(f, "no action"),
            CycleOutcome::AdvisoryFailed => write!(f, "advisory failed"),
            CycleOutcome::Submitted(result) => write!(f, "submitted: {result}"),
            CycleOutcome::SkippedInFlight => write!(f, "skipped (cycle in flight)"),
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    triggers: AtomicU64,
    advisory_failures: AtomicU64,
    no_action: AtomicU64,
    orders_accepted: AtomicU64,
    orders_rejected: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of `PipelineStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub triggers: u64,
    pub advisory_failures: u64,
    pub no_action: u64,
    pub orders_accepted: u64,
    pub orders_rejected: u64,
    pub skipped: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            triggers: self.triggers.load(Ordering::Relaxed),
            advisory_failures: self.advisory_failures.load(Ordering::Relaxed),
            no_action: self.no_action.load(Ordering::Relaxed),
            orders_accepted: self.orders_accepted.load(Ordering::Relaxed),
            orders_rejected: self.orders_rejected.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &CycleOutcome) {
        let counter = match outcome {
            CycleOutcome::NoAction => &self.no_action,
            CycleOutcome::AdvisoryFailed => &self.advisory_failures,
            CycleOutcome::Submitted(r) if r.accepted => &self.orders_accepted,
            CycleOutcome::Submitted(_) => &self.orders_rejected,
            CycleOutcome::SkippedInFlight => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Removes the entity from the in-flight set when the cycle ends, however
/// it ends.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    entity_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.entity_id);
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    store: Arc<EntityStateStore>,
    trigger: AnalysisTrigger,
    advisory: AdvisoryClient,
    parser: Box<dyn AdviceParser>,
    submitter: OrderSubmitter,
    overlap_policy: OverlapPolicy,
    in_flight: Mutex<HashSet<String>>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        store: Arc<EntityStateStore>,
        trigger: AnalysisTrigger,
        advisory: AdvisoryClient,
        parser: Box<dyn AdviceParser>,
        submitter: OrderSubmitter,
        overlap_policy: OverlapPolicy,
    ) -> Self {
        Self {
            store,
            trigger,
            advisory,
            parser,
            submitter,
            overlap_policy,
            in_flight: Mutex::new(HashSet::new()),
            stats: PipelineStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<EntityStateStore> {
        &self.store
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Append one observation and, if the trigger fires, run the cycle.
    ///
    /// Returns the cycle outcome, or `None` when the trigger did not fire.
    pub async fn observe(&self, observation: Observation) -> Option<CycleOutcome> {
        let entity_id = observation.entity_id().to_string();
        let (ticks, events) = self.store.append(observation);
        debug!(entity = %entity_id, ticks, events, "Observation stored");

        let snapshot = self.trigger.evaluate(&self.store, &entity_id)?;
        self.stats.triggers.fetch_add(1, Ordering::Relaxed);
        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, entity = %entity_id, ticks, events, "Analysis triggered");

        let outcome = match self.claim(&entity_id) {
            Some(_guard) => self.run_cycle(&snapshot).await,
            None => {
                info!(%cycle_id, entity = %entity_id, "Analysis already in flight, skipping");
                CycleOutcome::SkippedInFlight
            }
        };

        self.stats.record(&outcome);
        info!(%cycle_id, entity = %entity_id, outcome = %outcome, "Analysis cycle complete");
        Some(outcome)
    }

    /// Mark the entity as in flight. `None` means the overlap policy
    /// forbids starting another cycle for it right now.
    fn claim(&self, entity_id: &str) -> Option<Option<InFlightGuard<'_>>> {
        match self.overlap_policy {
            OverlapPolicy::Allow => Some(None),
            OverlapPolicy::SkipInFlight => {
                if !self.in_flight.lock().insert(entity_id.to_string()) {
                    return None;
                }
                Some(Some(InFlightGuard {
                    set: &self.in_flight,
                    entity_id: entity_id.to_string(),
                }))
            }
        }
    }

    async fn run_cycle(&self, snapshot: &AnalysisSnapshot) -> CycleOutcome {
        let advice = match self.advisory.advise(snapshot).await {
            Ok(text) => text,
            Err(e) => {
                warn!(entity = %snapshot.entity_id, error = %e, "Advisory call failed");
                return CycleOutcome::AdvisoryFailed;
            }
        };

        // Prefer the freshest price; ticks may have arrived during the call.
        let latest_price = self
            .store
            .latest_tick(&snapshot.entity_id)
            .map(|t| t.price)
            .or(Some(snapshot.latest_tick.price));

        match self.parser.parse(&snapshot.entity_id, &advice, latest_price) {
            Some(instruction) => {
                info!(entity = %snapshot.entity_id, instruction = %instruction, "Trade instruction parsed");
                CycleOutcome::Submitted(self.submitter.submit(&instruction).await)
            }
            None => {
                info!(entity = %snapshot.entity_id, "Advice recommends no trade");
                CycleOutcome::NoAction
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Pipeline {
    async fn handle(&self, message: FeedMessage) -> Result<()> {
        let observation = match message {
            FeedMessage::MarketData(tick) => Observation::Tick(tick),
            FeedMessage::PlayerEvent(event) => Observation::Event(event),
        };
        self.observe(observation).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
