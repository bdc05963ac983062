//! Starting positions and open orders supplied at LOAD.
//!
//! The pipeline carries these through the store for strategies to read; it
//! does not do portfolio accounting on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::intent::Action;
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: f64,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity.abs() * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: Symbol,
    pub side: Action,
    pub quantity: f64,
    pub limit_price: Option<f64>,
}
