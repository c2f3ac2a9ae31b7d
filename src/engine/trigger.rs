//! Analysis trigger.
//!
//! Evaluated after every append. Fires whenever the entity has enough
//! history; it is level-triggered, so once the thresholds are met every
//! further append for that entity fires again.

use crate::config::AnalysisConfig;
use crate::state::EntityStateStore;
use crate::types::{EventRecord, MarketTick};

/// Everything the advisory stage needs, captured under one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSnapshot {
    pub entity_id: String,
    /// Most recent last.
    pub events: Vec<EventRecord>,
    pub latest_tick: MarketTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTrigger {
    min_events: usize,
    min_ticks: usize,
    events_in_snapshot: usize,
}

impl Default for AnalysisTrigger {
    fn default() -> Self {
        Self::new(3, 1, 3)
    }
}

impl From<&AnalysisConfig> for AnalysisTrigger {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.min_events, cfg.min_ticks, cfg.events_in_prompt)
    }
}

impl AnalysisTrigger {
    /// `min_ticks` is floored at 1: a snapshot always carries a tick.
    pub fn new(min_events: usize, min_ticks: usize, events_in_snapshot: usize) -> Self {
        Self {
            min_events,
            min_ticks: min_ticks.max(1),
            events_in_snapshot,
        }
    }

    /// Pure threshold check.
    pub fn should_fire(&self, tick_count: usize, event_count: usize) -> bool {
        event_count >= self.min_events && tick_count >= self.min_ticks
    }

    /// Check the entity's current history and, if the thresholds are met,
    /// return the snapshot to analyse.
    pub fn evaluate(&self, store: &EntityStateStore, entity_id: &str) -> Option<AnalysisSnapshot> {
        store
            .with_entity(entity_id, |state| {
                if !self.should_fire(state.ticks.len(), state.events.len()) {
                    return None;
                }
                let latest_tick = state.latest_tick()?.clone();
                Some(AnalysisSnapshot {
                    entity_id: entity_id.to_string(),
                    events: state.recent_events(self.events_in_snapshot).to_vec(),
                    latest_tick,
                })
            })
            .flatten()
    }
}
