//! Per-entity state accumulation.
//!
//! One owned store holds every entity's tick and event history plus the
//! symbol registry. Both feed tasks share it behind an `Arc`; the single
//! mutex is never held across an `.await`.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::types::{EventRecord, MarketTick, Observation};

/// Accumulated history for one entity. Append-only.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    pub symbol: Option<String>,
    pub ticks: Vec<MarketTick>,
    pub events: Vec<EventRecord>,
}

impl EntityState {
    pub fn latest_tick(&self) -> Option<&MarketTick> {
        self.ticks.last()
    }

    /// The `n` most recent events, oldest first.
    pub fn recent_events(&self, n: usize) -> &[EventRecord] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }
}

/// Entity id → symbol, first write wins.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    symbols: HashMap<String, String>,
}

impl SymbolRegistry {
    pub fn get(&self, entity_id: &str) -> Option<&str> {
        self.symbols.get(entity_id).map(String::as_str)
    }

    /// Register `symbol` unless the entity already has one. Returns whether
    /// the registration took effect.
    pub fn set_if_absent(&mut self, entity_id: &str, symbol: &str) -> bool {
        if self.symbols.contains_key(entity_id) {
            return false;
        }
        self.symbols.insert(entity_id.to_string(), symbol.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    entities: HashMap<String, EntityState>,
    registry: SymbolRegistry,
}

/// Shared store of every entity's accumulated history.
#[derive(Debug, Default)]
pub struct EntityStateStore {
    inner: Mutex<Inner>,
}

impl EntityStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation, creating the entity on first sight. Ticks also
    /// register their symbol if the entity has none yet.
    ///
    /// Returns `(tick_count, event_count)` for the entity after the append.
    pub fn append(&self, observation: Observation) -> (usize, usize) {
        let mut inner = self.inner.lock();
        let Inner { entities, registry } = &mut *inner;

        let entity_id = observation.entity_id().to_string();
        let state = entities.entry(entity_id.clone()).or_default();

        match observation {
            Observation::Tick(tick) => {
                if registry.set_if_absent(&entity_id, &tick.symbol) {
                    debug!(entity = %entity_id, symbol = %tick.symbol, "Symbol registered");
                }
                if state.symbol.is_none() {
                    state.symbol = registry.get(&entity_id).map(str::to_string);
                }
                state.ticks.push(tick);
            }
            Observation::Event(event) => state.events.push(event),
        }

        (state.ticks.len(), state.events.len())
    }

    pub fn get_symbol(&self, entity_id: &str) -> Option<String> {
        self.inner.lock().registry.get(entity_id).map(str::to_string)
    }

    /// First-write-wins symbol assignment. Returns whether it took effect.
    pub fn set_symbol_if_absent(&self, entity_id: &str, symbol: &str) -> bool {
        let mut inner = self.inner.lock();
        let Inner { entities, registry } = &mut *inner;
        let set = registry.set_if_absent(entity_id, symbol);
        if set {
            if let Some(state) = entities.get_mut(entity_id) {
                state.symbol = Some(symbol.to_string());
            }
        }
        set
    }

    pub fn latest_tick(&self, entity_id: &str) -> Option<MarketTick> {
        self.inner
            .lock()
            .entities
            .get(entity_id)
            .and_then(|s| s.latest_tick().cloned())
    }

    /// `(tick_count, event_count)`; zeros for an unknown entity.
    pub fn counts(&self, entity_id: &str) -> (usize, usize) {
        self.inner
            .lock()
            .entities
            .get(entity_id)
            .map(|s| (s.ticks.len(), s.events.len()))
            .unwrap_or((0, 0))
    }

    /// The `n` most recent events for an entity, oldest first.
    pub fn recent_events(&self, entity_id: &str, n: usize) -> Vec<EventRecord> {
        self.inner
            .lock()
            .entities
            .get(entity_id)
            .map(|s| s.recent_events(n).to_vec())
            .unwrap_or_default()
    }

    /// Run `f` against an entity's state under the lock. Keeps multi-field
    /// reads consistent with each other.
    pub fn with_entity<R>(&self, entity_id: &str, f: impl FnOnce(&EntityState) -> R) -> Option<R> {
        self.inner.lock().entities.get(entity_id).map(f)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.lock().entities.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
