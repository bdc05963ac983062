//! Persisted run state.
//!
//! A [`StateSnapshot`] is written periodically during LOOP; LOAD reads it
//! back as a [`LoadedState`] to seed positions, orders and the tick counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::metrics::PipelineMetrics;
use crate::domain::position::{Order, Position};
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub environment: String,
    pub symbols: Vec<Symbol>,
    pub last_tick_id: u64,
    pub saved_at: DateTime<Utc>,
    pub last_prices: BTreeMap<Symbol, f64>,
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub metrics: PipelineMetrics,
}

/// What LOAD hands to the store. Empty when nothing was persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedState {
    pub positions: Vec<Position>,
    pub orders: Vec<Order>,
    pub last_tick_id: Option<u64>,
}

impl LoadedState {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.orders.is_empty() && self.last_tick_id.is_none()
    }
}

impl From<StateSnapshot> for LoadedState {
    fn from(snapshot: StateSnapshot) -> Self {
        LoadedState {
            positions: snapshot.positions,
            orders: snapshot.orders,
            last_tick_id: Some(snapshot.last_tick_id),
        }
    }
}

/// Storage key: `"{environment}:{symbols joined by ,}"`.
pub fn snapshot_key(environment: &str, symbols: &[Symbol]) -> String {
    let joined = symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!("{}:{}", environment, joined)
}
