//! Top-of-book indicators: bid/ask spread and mid price.
//!
//! Without a recorded book the spread is 0 and the mid is the last price.

use crate::domain::indicator::{IndicatorComputer, IndicatorName, IndicatorSet, IndicatorValues};
use crate::domain::state::MarketSnapshot;

#[derive(Debug, Default)]
pub struct SpreadComputer;

impl SpreadComputer {
    pub fn new() -> Self {
        Self
    }
}

impl IndicatorComputer for SpreadComputer {
    fn name(&self) -> &'static str {
        "spread"
    }

    fn defaults(&self) -> IndicatorValues {
        IndicatorValues::from([(IndicatorName::Spread, 0.0), (IndicatorName::MidPrice, 0.0)])
    }

    fn compute(&mut self, snapshot: &MarketSnapshot, _prior: &IndicatorSet) -> IndicatorSet {
        let mut set = IndicatorSet::new();
        for (symbol, quote) in snapshot.iter() {
            let (spread, mid) = match (quote.bid, quote.ask) {
                (Some(bid), Some(ask)) => (ask - bid, (bid + ask) / 2.0),
                _ => (0.0, quote.price),
            };
            set.set(symbol, IndicatorName::Spread, spread);
            set.set(symbol, IndicatorName::MidPrice, mid);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbol::Symbol;
    use approx::assert_relative_eq;

    fn btc() -> Symbol {
        Symbol::parse("BTC/USDT").unwrap()
    }

    #[test]
    fn no_book_falls_back_to_price() {
        let snapshot = MarketSnapshot::single(btc(), 100.0, Some(1));
        let set = SpreadComputer::new().compute(&snapshot, &IndicatorSet::new());
        assert_eq!(set.value(&btc(), IndicatorName::Spread), Some(0.0));
        assert_eq!(set.value(&btc(), IndicatorName::MidPrice), Some(100.0));
    }

    #[test]
    fn spread_and_mid_from_top_of_book() {
        let mut snapshot = MarketSnapshot::single(btc(), 100.0, Some(1));
        snapshot.set_top_of_book(&btc(), Some(99.9), Some(100.3));
        let set = SpreadComputer::new().compute(&snapshot, &IndicatorSet::new());
        assert_relative_eq!(set.value(&btc(), IndicatorName::Spread).unwrap(), 0.4, epsilon = 1e-9);
        assert_relative_eq!(set.value(&btc(), IndicatorName::MidPrice).unwrap(), 100.1, epsilon = 1e-9);
    }

    #[test]
    fn one_sided_book_is_ignored() {
        let mut snapshot = MarketSnapshot::single(btc(), 100.0, Some(1));
        snapshot.set_top_of_book(&btc(), Some(99.9), None);
        let set = SpreadComputer::new().compute(&snapshot, &IndicatorSet::new());
        assert_eq!(set.value(&btc(), IndicatorName::Spread), Some(0.0));
        assert_eq!(set.value(&btc(), IndicatorName::MidPrice), Some(100.0));
    }

    #[test]
    fn names_display() {
        assert_eq!(IndicatorName::Spread.to_string(), "SPREAD");
        assert_eq!(IndicatorName::MidPrice.to_string(), "MID_PRICE");
    }
}
