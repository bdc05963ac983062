//! Per-tick trading context (CTX stage).
//!
//! A [`TradingContext`] borrows from the store, so it cannot outlive the tick
//! and cannot be mutated while strategies read it.

use std::collections::BTreeMap;

use crate::domain::error::{StrategyError, TicktraderError};
use crate::domain::indicator::{IndicatorName, IndicatorSet, IndicatorValues};
use crate::domain::metrics::PipelineMetrics;
use crate::domain::pipeline::Stage;
use crate::domain::position::{Order, Position};
use crate::domain::state::{MarketSnapshot, SystemState};
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, Copy)]
pub struct TradingContext<'a> {
    pub tick_id: u64,
    pub market: &'a MarketSnapshot,
    pub indicators: &'a IndicatorSet,
    pub positions: &'a BTreeMap<Symbol, Position>,
    pub orders: &'a [Order],
    pub metrics: &'a PipelineMetrics,
    symbols: &'a [Symbol],
}

impl<'a> TradingContext<'a> {
    /// Assemble the context, checking that every configured symbol has a
    /// price and indicators for this tick.
    pub fn build(
        tick_id: u64,
        snapshot: &'a MarketSnapshot,
        indicators: &'a IndicatorSet,
        state: &'a SystemState,
    ) -> Result<Self, TicktraderError> {
        if snapshot.tick_id() != Some(tick_id) {
            return Err(TicktraderError::contract(
                Stage::Ctx,
                format!(
                    "market snapshot is at tick {:?}, expected {}",
                    snapshot.tick_id(),
                    tick_id
                ),
            ));
        }
        for symbol in state.symbols() {
            if !snapshot.contains(symbol) {
                return Err(TicktraderError::contract(
                    Stage::Ctx,
                    format!("symbol {} missing from market snapshot", symbol),
                ));
            }
            if !indicators.contains(symbol) {
                return Err(TicktraderError::contract(
                    Stage::Ctx,
                    format!("symbol {} missing from indicator set", symbol),
                ));
            }
        }

        Ok(TradingContext {
            tick_id,
            market: snapshot,
            indicators,
            positions: state.positions(),
            orders: state.orders(),
            metrics: state.metrics(),
            symbols: state.symbols(),
        })
    }

    /// Configured symbols in configuration order.
    pub fn symbols(&self) -> &'a [Symbol] {
        self.symbols
    }

    pub fn price(&self, symbol: &Symbol) -> Option<f64> {
        self.market.price(symbol)
    }

    pub fn indicators_for(&self, symbol: &Symbol) -> Option<&'a IndicatorValues> {
        self.indicators.get(symbol)
    }

    pub fn indicator(&self, symbol: &Symbol, name: IndicatorName) -> Option<f64> {
        self.indicators.value(symbol, name)
    }

    pub fn require_indicator(
        &self,
        symbol: &Symbol,
        name: IndicatorName,
    ) -> Result<f64, StrategyError> {
        self.indicator(symbol, name)
            .ok_or_else(|| StrategyError::MissingIndicator {
                symbol: symbol.to_string(),
                indicator: name.to_string(),
            })
    }

    /// Price samples seen for `symbol`, including warm-up history.
    pub fn samples(&self, symbol: &Symbol) -> usize {
        self.indicator(symbol, IndicatorName::Samples)
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&'a Position> {
        self.positions.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tick::Tick;
    use chrono::Utc;

    fn btc() -> Symbol {
        Symbol::parse("BTC/USDT").unwrap()
    }

    fn eth() -> Symbol {
        Symbol::parse("ETH/USDT").unwrap()
    }

    fn fed_state(symbols: Vec<Symbol>, tick_id: u64) -> SystemState {
        let mut state = SystemState::new(symbols.clone());
        let tick = Tick {
            id: tick_id,
            timestamp: Utc::now(),
            prices: symbols.iter().map(|s| (s.clone(), 100.0)).collect(),
        };
        state.apply_tick(&tick).unwrap();
        let mut set = IndicatorSet::new();
        for s in &symbols {
            set.set(s, IndicatorName::Price, 100.0);
            set.set(s, IndicatorName::Samples, 4.0);
        }
        state.set_indicators(set);
        state
    }

    #[test]
    fn build_exposes_store_views() {
        let state = fed_state(vec![btc(), eth()], 1);
        let ctx = TradingContext::build(1, state.market(), state.indicators(), &state).unwrap();
        assert_eq!(ctx.tick_id, 1);
        assert_eq!(ctx.symbols(), &[btc(), eth()]);
        assert_eq!(ctx.price(&eth()), Some(100.0));
        assert_eq!(ctx.samples(&btc()), 4);
        assert!(ctx.position(&btc()).is_none());
    }

    #[test]
    fn missing_indicators_is_contract_violation() {
        let state = fed_state(vec![btc(), eth()], 1);
        let mut partial = IndicatorSet::new();
        partial.set(&btc(), IndicatorName::Price, 100.0);
        let err = TradingContext::build(1, state.market(), &partial, &state).unwrap_err();
        assert_eq!(
            err.to_string(),
            "contract violation at CTX: symbol ETH/USDT missing from indicator set"
        );
    }

    #[test]
    fn stale_snapshot_is_contract_violation() {
        let state = fed_state(vec![btc()], 1);
        assert!(TradingContext::build(2, state.market(), state.indicators(), &state).is_err());
    }

    #[test]
    fn require_indicator_reports_missing() {
        let state = fed_state(vec![btc()], 1);
        let ctx = TradingContext::build(1, state.market(), state.indicators(), &state).unwrap();
        assert_eq!(ctx.require_indicator(&btc(), IndicatorName::Price), Ok(100.0));
        assert_eq!(
            ctx.require_indicator(&btc(), IndicatorName::Rsi(14)),
            Err(StrategyError::MissingIndicator {
                symbol: "BTC/USDT".into(),
                indicator: "RSI(14)".into(),
            })
        );
    }
}
