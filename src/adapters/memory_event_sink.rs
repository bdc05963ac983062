//! In-memory event capture.
//!
//! Clones share one buffer, so a caller can keep a handle while the driver
//! owns the sink.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::pipeline::{EventLevel, Stage, StageEvent};
use crate::ports::event_sink::EventSink;

#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<StageEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StageEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Stages logged for `tick_id`, in emission order.
    pub fn stages_for(&self, tick_id: u64) -> Vec<Stage> {
        self.lock()
            .iter()
            .filter(|e| e.tick_id == Some(tick_id))
            .map(|e| e.stage)
            .collect()
    }

    /// Distinct tick ids in first-seen order.
    pub fn tick_ids(&self) -> Vec<u64> {
        let mut ids = Vec::new();
        for id in self.lock().iter().filter_map(|e| e.tick_id) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn at_level(&self, level: EventLevel) -> Vec<StageEvent> {
        self.lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&mut self, event: &StageEvent) {
        self.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_buffer() {
        let handle = MemoryEventSink::new();
        let mut sink = handle.clone();
        sink.emit(&StageEvent::info(Stage::Tick, Some(1), "a"));
        sink.emit(&StageEvent::info(Stage::Feeds, Some(1), "b"));
        sink.emit(&StageEvent::warn(Stage::Strat, Some(2), "c"));
        assert_eq!(handle.len(), 3);
        assert_eq!(handle.stages_for(1), vec![Stage::Tick, Stage::Feeds]);
        assert_eq!(handle.tick_ids(), vec![1, 2]);
        assert_eq!(handle.at_level(EventLevel::Warn).len(), 1);
        handle.clear();
        assert!(sink.is_empty());
    }
}
