//! Technical indicators (IND stage).
//!
//! - `IndicatorName`: indicator identity + parameters (serves as map key)
//! - `IndicatorValues`: named values for one symbol
//! - `IndicatorSet`: values for every symbol, owned by the store
//! - `IndicatorComputer`: pluggable computation registered at boot
//! - `IndicatorStage`: runs the registered computers in order

pub mod ema;
pub mod rsi;
pub mod sma;
pub mod spread;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::state::MarketSnapshot;
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorName {
    Price,
    Samples,
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Spread,
    MidPrice,
}

impl fmt::Display for IndicatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorName::Price => write!(f, "PRICE"),
            IndicatorName::Samples => write!(f, "SAMPLES"),
            IndicatorName::Sma(period) => write!(f, "SMA({})", period),
            IndicatorName::Ema(period) => write!(f, "EMA({})", period),
            IndicatorName::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorName::Spread => write!(f, "SPREAD"),
            IndicatorName::MidPrice => write!(f, "MID_PRICE"),
        }
    }
}

pub type IndicatorValues = BTreeMap<IndicatorName, f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    values: BTreeMap<Symbol, IndicatorValues>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&IndicatorValues> {
        self.values.get(symbol)
    }

    pub fn value(&self, symbol: &Symbol, name: IndicatorName) -> Option<f64> {
        self.values.get(symbol).and_then(|v| v.get(&name)).copied()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.values.contains_key(symbol)
    }

    pub fn insert(&mut self, symbol: Symbol, values: IndicatorValues) {
        self.values.insert(symbol, values);
    }

    /// Overlay `values` onto whatever is already stored for `symbol`.
    pub fn merge(&mut self, symbol: &Symbol, values: IndicatorValues) {
        self.values.entry(symbol.clone()).or_default().extend(values);
    }

    pub fn set(&mut self, symbol: &Symbol, name: IndicatorName, value: f64) {
        self.values.entry(symbol.clone()).or_default().insert(name, value);
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &IndicatorValues)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A pluggable indicator computation.
///
/// `compute` sees the current snapshot and the previous tick's indicator
/// set. It must return values for every symbol in the snapshot, falling back
/// to `defaults` when a symbol has no history yet. A snapshot without a tick
/// id is a warm-up replay: cadence gating is bypassed.
pub trait IndicatorComputer {
    fn name(&self) -> &'static str;

    fn defaults(&self) -> IndicatorValues;

    fn compute(&mut self, snapshot: &MarketSnapshot, prior: &IndicatorSet) -> IndicatorSet;
}

pub struct IndicatorStage {
    computers: Vec<Box<dyn IndicatorComputer>>,
}

impl IndicatorStage {
    pub fn new(computers: Vec<Box<dyn IndicatorComputer>>) -> Self {
        Self { computers }
    }

    pub fn register(&mut self, computer: Box<dyn IndicatorComputer>) {
        self.computers.push(computer);
    }

    pub fn computer_names(&self) -> Vec<&'static str> {
        self.computers.iter().map(|c| c.name()).collect()
    }

    pub fn defaults(&self) -> IndicatorValues {
        let mut values = IndicatorValues::new();
        values.insert(IndicatorName::Price, 0.0);
        for computer in &self.computers {
            values.extend(computer.defaults());
        }
        values
    }

    /// Default values for every symbol, used when there is no history.
    pub fn defaults_for(&self, symbols: &[Symbol]) -> IndicatorSet {
        let mut set = IndicatorSet::new();
        for symbol in symbols {
            set.insert(symbol.clone(), self.defaults());
        }
        set
    }

    pub fn compute(&mut self, snapshot: &MarketSnapshot, prior: &IndicatorSet) -> IndicatorSet {
        let mut next = IndicatorSet::new();
        for (symbol, quote) in snapshot.iter() {
            let mut values = prior.get(symbol).cloned().unwrap_or_else(|| self.defaults());
            values.insert(IndicatorName::Price, quote.price);
            next.insert(symbol.clone(), values);
        }
        for computer in self.computers.iter_mut() {
            let computed = computer.compute(snapshot, prior);
            for (symbol, values) in computed.values {
                next.merge(&symbol, values);
            }
        }
        next
    }

    /// Replay historical prices for one symbol through every computer.
    pub fn warm_up(&mut self, symbol: &Symbol, history: &[f64]) -> IndicatorValues {
        let mut prior = IndicatorSet::new();
        for &price in history {
            let snapshot = MarketSnapshot::replay(symbol.clone(), price);
            prior = self.compute(&snapshot, &prior);
        }
        prior
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| self.defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Symbol {
        Symbol::parse("BTC/USDT").unwrap()
    }

    struct ConstComputer(f64);

    impl IndicatorComputer for ConstComputer {
        fn name(&self) -> &'static str {
            "const"
        }
        fn defaults(&self) -> IndicatorValues {
            IndicatorValues::from([(IndicatorName::Rsi(2), -1.0)])
        }
        fn compute(&mut self, snapshot: &MarketSnapshot, _prior: &IndicatorSet) -> IndicatorSet {
            let mut set = IndicatorSet::new();
            for symbol in snapshot.symbols() {
                set.set(symbol, IndicatorName::Rsi(2), self.0);
            }
            set
        }
    }

    #[test]
    fn indicator_name_display() {
        assert_eq!(IndicatorName::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorName::Ema(12).to_string(), "EMA(12)");
        assert_eq!(IndicatorName::Rsi(14).to_string(), "RSI(14)");
        assert_eq!(IndicatorName::Price.to_string(), "PRICE");
    }

    #[test]
    fn indicator_name_orders_as_key() {
        let mut values = IndicatorValues::new();
        values.insert(IndicatorName::Sma(50), 2.0);
        values.insert(IndicatorName::Sma(5), 1.0);
        values.insert(IndicatorName::Price, 0.5);
        let keys: Vec<_> = values.keys().copied().collect();
        assert_eq!(
            keys,
            vec![IndicatorName::Price, IndicatorName::Sma(5), IndicatorName::Sma(50)]
        );
    }

    #[test]
    fn merge_overlays_values() {
        let mut set = IndicatorSet::new();
        set.set(&btc(), IndicatorName::Price, 1.0);
        set.merge(&btc(), IndicatorValues::from([(IndicatorName::Sma(5), 2.0)]));
        assert_eq!(set.value(&btc(), IndicatorName::Price), Some(1.0));
        assert_eq!(set.value(&btc(), IndicatorName::Sma(5)), Some(2.0));
    }

    #[test]
    fn stage_sets_price_and_computer_values() {
        let mut stage = IndicatorStage::new(vec![Box::new(ConstComputer(7.0))]);
        let snapshot = MarketSnapshot::replay(btc(), 101.5);
        let set = stage.compute(&snapshot, &IndicatorSet::new());
        assert_eq!(set.value(&btc(), IndicatorName::Price), Some(101.5));
        assert_eq!(set.value(&btc(), IndicatorName::Rsi(2)), Some(7.0));
    }

    #[test]
    fn defaults_cover_every_symbol() {
        let stage = IndicatorStage::new(vec![Box::new(ConstComputer(7.0))]);
        let eth = Symbol::parse("ETH/USDT").unwrap();
        let set = stage.defaults_for(&[btc(), eth.clone()]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.value(&eth, IndicatorName::Rsi(2)), Some(-1.0));
        assert_eq!(set.value(&eth, IndicatorName::Price), Some(0.0));
    }

    #[test]
    fn warm_up_without_history_gives_defaults() {
        let mut stage = IndicatorStage::new(vec![Box::new(ConstComputer(7.0))]);
        let values = stage.warm_up(&btc(), &[]);
        assert_eq!(values, stage.defaults());
    }

    #[test]
    fn warm_up_replays_history() {
        let mut stage = IndicatorStage::new(vec![Box::new(ConstComputer(7.0))]);
        let values = stage.warm_up(&btc(), &[1.0, 2.0, 3.0]);
        assert_eq!(values.get(&IndicatorName::Price), Some(&3.0));
        assert_eq!(values.get(&IndicatorName::Rsi(2)), Some(&7.0));
    }
}
