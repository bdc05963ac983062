//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (or 50 when the price never moved).
//!
//! Until n changes have been seen the value is the neutral 50.

use std::collections::HashMap;

use crate::domain::indicator::{IndicatorComputer, IndicatorName, IndicatorSet, IndicatorValues};
use crate::domain::state::MarketSnapshot;
use crate::domain::symbol::Symbol;

pub const NEUTRAL_RSI: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default)]
struct RsiState {
    prev_price: Option<f64>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl RsiState {
    fn update(&mut self, price: f64, period: usize) -> f64 {
        let Some(prev) = self.prev_price.replace(price) else {
            return NEUTRAL_RSI;
        };
        let change = price - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.changes += 1;

        if self.changes <= period {
            let n = self.changes as f64;
            self.avg_gain += (gain - self.avg_gain) / n;
            self.avg_loss += (loss - self.avg_loss) / n;
            if self.changes < period {
                return NEUTRAL_RSI;
            }
        } else {
            let n = period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        rsi_from_averages(self.avg_gain, self.avg_loss)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { NEUTRAL_RSI } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub struct RsiComputer {
    period: usize,
    states: HashMap<Symbol, RsiState>,
}

impl RsiComputer {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            states: HashMap::new(),
        }
    }
}

impl IndicatorComputer for RsiComputer {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn defaults(&self) -> IndicatorValues {
        IndicatorValues::from([(IndicatorName::Rsi(self.period), NEUTRAL_RSI)])
    }

    fn compute(&mut self, snapshot: &MarketSnapshot, _prior: &IndicatorSet) -> IndicatorSet {
        let period = self.period;
        let mut set = IndicatorSet::new();
        for (symbol, quote) in snapshot.iter() {
            let rsi = self
                .states
                .entry(symbol.clone())
                .or_default()
                .update(quote.price, period);
            set.set(symbol, IndicatorName::Rsi(period), rsi);
        }
        set
    }
}
