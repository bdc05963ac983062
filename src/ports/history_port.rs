//! Historical price source port trait, used at WARMUP.

use crate::domain::error::TicktraderError;
use crate::domain::symbol::Symbol;

pub trait HistoryPort {
    /// Up to `limit` most recent prices for `symbol`, oldest first.
    fn recent_prices(&self, symbol: &Symbol, limit: usize) -> Result<Vec<f64>, TicktraderError>;
}
