//! Layered simple moving averages.
//!
//! Three layers (fast/medium/heavy), each with its own window and update
//! cadence in ticks. A layer is recomputed only on ticks divisible by its
//! cadence; otherwise the prior value carries forward. Until a window has
//! filled the layer reports the mean of the samples seen so far.

use std::collections::{HashMap, VecDeque};

use crate::domain::indicator::{IndicatorComputer, IndicatorName, IndicatorSet, IndicatorValues};
use crate::domain::state::MarketSnapshot;
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmaLayer {
    pub window: usize,
    pub interval: u64,
}

impl SmaLayer {
    pub fn new(window: usize, interval: u64) -> Self {
        Self { window, interval }
    }

    fn is_due(&self, tick_id: Option<u64>) -> bool {
        match tick_id {
            None => true,
            Some(id) => self.interval > 0 && id % self.interval == 0,
        }
    }
}

pub struct MovingAverageComputer {
    layers: Vec<SmaLayer>,
    capacity: usize,
    history: HashMap<Symbol, VecDeque<f64>>,
}

impl MovingAverageComputer {
    pub fn new(layers: Vec<SmaLayer>) -> Self {
        let capacity = layers.iter().map(|l| l.window).max().unwrap_or(1).max(1);
        Self {
            layers,
            capacity,
            history: HashMap::new(),
        }
    }

    pub fn samples(&self, symbol: &Symbol) -> usize {
        self.history.get(symbol).map(|h| h.len()).unwrap_or(0)
    }
}

fn mean_of_last(history: &VecDeque<f64>, window: usize) -> f64 {
    let n = window.min(history.len());
    if n == 0 {
        return 0.0;
    }
    history.iter().rev().take(n).sum::<f64>() / n as f64
}

impl IndicatorComputer for MovingAverageComputer {
    fn name(&self) -> &'static str {
        "sma"
    }

    fn defaults(&self) -> IndicatorValues {
        let mut values = IndicatorValues::new();
        values.insert(IndicatorName::Samples, 0.0);
        for layer in &self.layers {
            values.insert(IndicatorName::Sma(layer.window), 0.0);
        }
        values
    }

    fn compute(&mut self, snapshot: &MarketSnapshot, prior: &IndicatorSet) -> IndicatorSet {
        let mut set = IndicatorSet::new();
        let tick_id = snapshot.tick_id();
        let capacity = self.capacity;

        for (symbol, quote) in snapshot.iter() {
            let history = self
                .history
                .entry(symbol.clone())
                .or_insert_with(|| VecDeque::with_capacity(capacity));
            if history.len() == capacity {
                history.pop_front();
            }
            history.push_back(quote.price);

            let mut values = IndicatorValues::new();
            values.insert(IndicatorName::Samples, history.len() as f64);
            for layer in &self.layers {
                let name = IndicatorName::Sma(layer.window);
                let carried = prior.value(symbol, name).filter(|_| history.len() > 1);
                let value = match carried {
                    Some(v) if !layer.is_due(tick_id) => v,
                    _ => mean_of_last(history, layer.window),
                };
                values.insert(name, value);
            }
            set.insert(symbol.clone(), values);
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn btc() -> Symbol {
        Symbol::parse("BTC/USDT").unwrap()
    }

    fn feed(computer: &mut MovingAverageComputer, prices: &[f64]) -> IndicatorSet {
        let mut prior = IndicatorSet::new();
        for (i, &p) in prices.iter().enumerate() {
            let snapshot = MarketSnapshot::single(btc(), p, Some(i as u64 + 1));
            prior = computer.compute(&snapshot, &prior);
        }
        prior
    }

    #[test]
    fn partial_window_is_mean_of_seen() {
        let mut c = MovingAverageComputer::new(vec![SmaLayer::new(5, 1)]);
        let set = feed(&mut c, &[10.0, 20.0]);
        assert_relative_eq!(set.value(&btc(), IndicatorName::Sma(5)).unwrap(), 15.0);
        assert_relative_eq!(set.value(&btc(), IndicatorName::Samples).unwrap(), 2.0);
    }

    #[test]
    fn full_window_uses_last_n() {
        let mut c = MovingAverageComputer::new(vec![SmaLayer::new(3, 1)]);
        let set = feed(&mut c, &[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_relative_eq!(set.value(&btc(), IndicatorName::Sma(3)).unwrap(), 40.0);
    }

    #[test]
    fn history_is_bounded() {
        let mut c = MovingAverageComputer::new(vec![SmaLayer::new(3, 1), SmaLayer::new(4, 1)]);
        feed(&mut c, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(c.samples(&btc()), 4);
    }

    #[test]
    fn layer_carries_prior_between_cadence_ticks() {
        let mut c = MovingAverageComputer::new(vec![SmaLayer::new(2, 3)]);
        // tick 1: first sample computes; tick 2: carried; tick 3: due
        let set = feed(&mut c, &[10.0, 20.0]);
        assert_relative_eq!(set.value(&btc(), IndicatorName::Sma(2)).unwrap(), 10.0);

        let prior = set;
        let snapshot = MarketSnapshot::single(btc(), 30.0, Some(3));
        let set = c.compute(&snapshot, &prior);
        assert_relative_eq!(set.value(&btc(), IndicatorName::Sma(2)).unwrap(), 25.0);
    }

    #[test]
    fn replay_snapshot_ignores_cadence() {
        let mut c = MovingAverageComputer::new(vec![SmaLayer::new(2, 100)]);
        let mut prior = IndicatorSet::new();
        for p in [10.0, 20.0, 30.0] {
            prior = c.compute(&MarketSnapshot::replay(btc(), p), &prior);
        }
        assert_relative_eq!(prior.value(&btc(), IndicatorName::Sma(2)).unwrap(), 25.0);
    }

    #[test]
    fn defaults_are_zero() {
        let c = MovingAverageComputer::new(vec![SmaLayer::new(5, 1), SmaLayer::new(20, 3)]);
        let d = c.defaults();
        assert_eq!(d.get(&IndicatorName::Sma(5)), Some(&0.0));
        assert_eq!(d.get(&IndicatorName::Sma(20)), Some(&0.0));
        assert_eq!(d.get(&IndicatorName::Samples), Some(&0.0));
    }
}
