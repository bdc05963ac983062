//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n prices, then
//! EMA = P*k + EMA_prev*(1-k). Before n prices the value is the running mean.

use std::collections::HashMap;

use crate::domain::indicator::{IndicatorComputer, IndicatorName, IndicatorSet, IndicatorValues};
use crate::domain::state::MarketSnapshot;
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, Copy, Default)]
struct EmaState {
    count: usize,
    sum: f64,
    ema: f64,
}

pub struct EmaComputer {
    period: usize,
    states: HashMap<Symbol, EmaState>,
}

impl EmaComputer {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            states: HashMap::new(),
        }
    }

    fn smoothing(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }
}

impl IndicatorComputer for EmaComputer {
    fn name(&self) -> &'static str {
        "ema"
    }

    fn defaults(&self) -> IndicatorValues {
        IndicatorValues::from([(IndicatorName::Ema(self.period), 0.0)])
    }

    fn compute(&mut self, snapshot: &MarketSnapshot, _prior: &IndicatorSet) -> IndicatorSet {
        let k = self.smoothing();
        let period = self.period;
        let mut set = IndicatorSet::new();

        for (symbol, quote) in snapshot.iter() {
            let state = self.states.entry(symbol.clone()).or_default();
            state.count += 1;
            if state.count <= period {
                state.sum += quote.price;
                state.ema = state.sum / state.count as f64;
            } else {
                state.ema = quote.price * k + state.ema * (1.0 - k);
            }
            set.set(symbol, IndicatorName::Ema(period), state.ema);
        }

        set
    }
}
