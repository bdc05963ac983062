//! In-memory state store. Clones share the same map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::error::TicktraderError;
use crate::domain::snapshot::{LoadedState, StateSnapshot};
use crate::ports::state_store_port::StateStorePort;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    snapshots: Arc<Mutex<HashMap<String, StateSnapshot>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StateSnapshot>> {
        self.snapshots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<StateSnapshot> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, snapshot: StateSnapshot) {
        self.lock().insert(key.to_string(), snapshot);
    }
}

impl StateStorePort for InMemoryStateStore {
    fn load(&self, key: &str) -> Result<LoadedState, TicktraderError> {
        Ok(self.get(key).map(LoadedState::from).unwrap_or_default())
    }

    fn save(&mut self, key: &str, snapshot: &StateSnapshot) -> Result<(), TicktraderError> {
        self.insert(key, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::PipelineMetrics;
    use crate::domain::symbol::Symbol;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn load_missing_is_empty() {
        let store = InMemoryStateStore::new();
        assert!(store.load("local:BTC/USDT").unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let handle = InMemoryStateStore::new();
        let mut store = handle.clone();
        let snapshot = StateSnapshot {
            environment: "local".into(),
            symbols: vec![Symbol::pair("BTC", "USDT")],
            last_tick_id: 12,
            saved_at: Utc::now(),
            last_prices: BTreeMap::new(),
            positions: vec![],
            orders: vec![],
            metrics: PipelineMetrics::default(),
        };
        store.save("local:BTC/USDT", &snapshot).unwrap();
        assert_eq!(handle.load("local:BTC/USDT").unwrap().last_tick_id, Some(12));
        assert_eq!(handle.get("local:BTC/USDT"), Some(snapshot));
    }
}
