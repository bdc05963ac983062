//! Market context and system state store.
//!
//! [`SystemState`] is owned by the driver and threaded by reference into each
//! stage. FEEDS writes the market snapshot, IND the indicator set, STATE the
//! metrics and last decision. Nothing replaces the store wholesale.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::error::TicktraderError;
use crate::domain::execution::ExecutionResult;
use crate::domain::indicator::IndicatorSet;
use crate::domain::intent::Decision;
use crate::domain::market::{CacheLimits, MarketCache, OrderFlow};
use crate::domain::metrics::PipelineMetrics;
use crate::domain::pipeline::Stage;
use crate::domain::position::{Order, Position};
use crate::domain::snapshot::{LoadedState, StateSnapshot};
use crate::domain::symbol::Symbol;
use crate::domain::tick::Tick;

/// Last price plus top of book, when order flow has been recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

/// Latest quote per symbol. Holds only the most recent tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    quotes: BTreeMap<Symbol, Quote>,
    tick_id: Option<u64>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A historical price with no tick id, used to seed indicators at WARMUP.
    pub fn replay(symbol: Symbol, price: f64) -> Self {
        Self::single(symbol, price, None)
    }

    pub fn single(symbol: Symbol, price: f64, tick_id: Option<u64>) -> Self {
        let mut quotes = BTreeMap::new();
        quotes.insert(
            symbol,
            Quote {
                price,
                timestamp: DateTime::<Utc>::default(),
                bid: None,
                ask: None,
            },
        );
        Self { quotes, tick_id }
    }

    pub fn tick_id(&self) -> Option<u64> {
        self.tick_id
    }

    pub fn price(&self, symbol: &Symbol) -> Option<f64> {
        self.quotes.get(symbol).map(|q| q.price)
    }

    pub fn quote(&self, symbol: &Symbol) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.quotes.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.quotes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Quote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn prices(&self) -> BTreeMap<Symbol, f64> {
        self.quotes
            .iter()
            .map(|(s, q)| (s.clone(), q.price))
            .collect()
    }

    /// Overwrite stored prices from `tick`. Returns how many prices changed.
    /// Top of book survives only a replay of the tick it was recorded for.
    fn apply(&mut self, tick: &Tick) -> usize {
        let replay = self.tick_id == Some(tick.id);
        let mut changed = 0;
        for (symbol, &price) in &tick.prices {
            let (bid, ask) = match self.quotes.get(symbol) {
                Some(q) if replay => (q.bid, q.ask),
                _ => (None, None),
            };
            let quote = Quote {
                price,
                timestamp: tick.timestamp,
                bid,
                ask,
            };
            if self.quotes.insert(symbol.clone(), quote).map(|q| q.price) != Some(price) {
                changed += 1;
            }
        }
        self.tick_id = Some(tick.id);
        changed
    }

    pub(crate) fn set_top_of_book(&mut self, symbol: &Symbol, bid: Option<f64>, ask: Option<f64>) {
        if let Some(quote) = self.quotes.get_mut(symbol) {
            quote.bid = bid;
            quote.ask = ask;
        }
    }
}

/// What FEEDS did with one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub tick_id: u64,
    pub symbols: usize,
    pub changed: usize,
}

#[derive(Debug, Clone)]
pub struct SystemState {
    symbols: Vec<Symbol>,
    market: MarketSnapshot,
    cache_limits: CacheLimits,
    caches: BTreeMap<Symbol, MarketCache>,
    indicators: IndicatorSet,
    positions: BTreeMap<Symbol, Position>,
    orders: Vec<Order>,
    metrics: PipelineMetrics,
    last_decision: Option<Decision>,
    last_execution: Option<ExecutionResult>,
}

impl SystemState {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            market: MarketSnapshot::new(),
            cache_limits: CacheLimits::default(),
            caches: BTreeMap::new(),
            indicators: IndicatorSet::new(),
            positions: BTreeMap::new(),
            orders: Vec::new(),
            metrics: PipelineMetrics::default(),
            last_decision: None,
            last_execution: None,
        }
    }

    pub fn with_cache_limits(mut self, limits: CacheLimits) -> Self {
        self.cache_limits = limits;
        self
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn market(&self) -> &MarketSnapshot {
        &self.market
    }

    pub fn market_cache(&self, symbol: &Symbol) -> Option<&MarketCache> {
        self.caches.get(symbol)
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn positions(&self) -> &BTreeMap<Symbol, Position> {
        &self.positions
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    pub fn last_execution(&self) -> Option<&ExecutionResult> {
        self.last_execution.as_ref()
    }

    pub fn last_tick_id(&self) -> Option<u64> {
        self.metrics.last_tick_id
    }

    /// LOAD: seed starting positions and open orders.
    pub fn load(&mut self, loaded: LoadedState) {
        self.positions = loaded
            .positions
            .into_iter()
            .map(|p| (p.symbol.clone(), p))
            .collect();
        self.orders = loaded.orders;
        if loaded.last_tick_id.is_some() {
            self.metrics.last_tick_id = loaded.last_tick_id;
        }
    }

    /// FEEDS: overwrite the market snapshot from a tick.
    ///
    /// Re-applying the tick currently held is a no-op. Older tick ids, or a
    /// tick whose symbols differ from the configured set, are contract
    /// violations.
    pub fn apply_tick(&mut self, tick: &Tick) -> Result<FeedSummary, TicktraderError> {
        if let Some(current) = self.market.tick_id() {
            if tick.id < current {
                return Err(TicktraderError::contract(
                    Stage::Feeds,
                    format!("tick {} arrived after tick {}", tick.id, current),
                ));
            }
        }
        for symbol in &self.symbols {
            match tick.price(symbol) {
                None => {
                    return Err(TicktraderError::contract(
                        Stage::Feeds,
                        format!("tick {} has no price for {}", tick.id, symbol),
                    ));
                }
                Some(price) if !price.is_finite() || price <= 0.0 => {
                    return Err(TicktraderError::contract(
                        Stage::Feeds,
                        format!("tick {} has invalid price {} for {}", tick.id, price, symbol),
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = tick.prices.keys().find(|s| !self.symbols.contains(s)) {
            return Err(TicktraderError::contract(
                Stage::Feeds,
                format!("tick {} carries unconfigured symbol {}", tick.id, extra),
            ));
        }

        let changed = self.market.apply(tick);
        Ok(FeedSummary {
            tick_id: tick.id,
            symbols: tick.prices.len(),
            changed,
        })
    }

    /// FEEDS: record simulated or live order flow for the tick just applied.
    ///
    /// Flow must belong to the current tick and a configured symbol. Returns
    /// how many symbols were recorded.
    pub fn record_order_flow(
        &mut self,
        flows: &BTreeMap<Symbol, OrderFlow>,
    ) -> Result<usize, TicktraderError> {
        let current = self.market.tick_id();
        for (symbol, flow) in flows {
            if !self.symbols.contains(symbol) {
                return Err(TicktraderError::contract(
                    Stage::Feeds,
                    format!("order flow for unconfigured symbol {}", symbol),
                ));
            }
            if current != Some(flow.tick_id()) {
                return Err(TicktraderError::contract(
                    Stage::Feeds,
                    format!(
                        "order flow for tick {} does not match current tick {:?}",
                        flow.tick_id(),
                        current
                    ),
                ));
            }
        }

        let limits = self.cache_limits;
        for (symbol, flow) in flows {
            let cache = self
                .caches
                .entry(symbol.clone())
                .or_insert_with(|| MarketCache::new(limits));
            cache.record(flow);
            let book = cache.order_book();
            let bid = book.and_then(|b| b.best_bid());
            let ask = book.and_then(|b| b.best_ask());
            self.market.set_top_of_book(symbol, bid, ask);
        }
        Ok(flows.len())
    }

    /// IND: replace the indicator set.
    pub fn set_indicators(&mut self, indicators: IndicatorSet) {
        self.indicators = indicators;
    }

    pub fn record_strategy_failures(&mut self, count: usize) {
        self.metrics.strategy_failures += count as u64;
    }

    /// STATE: fold the tick's execution outcome into the metrics.
    pub fn apply_execution(&mut self, result: &ExecutionResult, tick: &Tick) {
        self.metrics.ticks_processed += 1;
        self.metrics.last_tick_id = Some(tick.id);
        self.metrics.record_execution(result.status);
        if let Some(decision) = &result.decision {
            self.metrics.decisions_made += 1;
            self.last_decision = Some(decision.clone());
        }
        self.last_execution = Some(result.clone());
    }

    pub fn to_snapshot(&self, environment: &str, saved_at: DateTime<Utc>) -> StateSnapshot {
        StateSnapshot {
            environment: environment.to_string(),
            symbols: self.symbols.clone(),
            last_tick_id: self.metrics.last_tick_id.unwrap_or(0),
            saved_at,
            last_prices: self.market.prices(),
            positions: self.positions.values().cloned().collect(),
            orders: self.orders.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionStatus;
    use crate::domain::intent::{Action, Intent};
    use crate::domain::market::OrderFlowSimulator;
    use chrono::TimeZone;

    fn btc() -> Symbol {
        Symbol::parse("BTC/USDT").unwrap()
    }

    fn eth() -> Symbol {
        Symbol::parse("ETH/USDT").unwrap()
    }

    fn tick(id: u64, btc_price: f64, eth_price: f64) -> Tick {
        Tick {
            id,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            prices: BTreeMap::from([(btc(), btc_price), (eth(), eth_price)]),
        }
    }

    #[test]
    fn feeds_overwrites_prices() {
        let mut state = SystemState::new(vec![btc(), eth()]);
        state.apply_tick(&tick(1, 100.0, 10.0)).unwrap();
        let summary = state.apply_tick(&tick(2, 101.0, 10.0)).unwrap();
        assert_eq!(summary.symbols, 2);
        assert_eq!(summary.changed, 1);
        assert_eq!(state.market().price(&btc()), Some(101.0));
        assert_eq!(state.market().tick_id(), Some(2));
    }

    #[test]
    fn feeds_is_idempotent() {
        let mut once = SystemState::new(vec![btc(), eth()]);
        once.apply_tick(&tick(1, 100.0, 10.0)).unwrap();

        let mut twice = SystemState::new(vec![btc(), eth()]);
        twice.apply_tick(&tick(1, 100.0, 10.0)).unwrap();
        let summary = twice.apply_tick(&tick(1, 100.0, 10.0)).unwrap();

        assert_eq!(summary.changed, 0);
        assert_eq!(once.market(), twice.market());
    }

    #[test]
    fn older_tick_is_contract_violation() {
        let mut state = SystemState::new(vec![btc(), eth()]);
        state.apply_tick(&tick(5, 100.0, 10.0)).unwrap();
        let err = state.apply_tick(&tick(4, 100.0, 10.0)).unwrap_err();
        assert!(matches!(
            err,
            TicktraderError::ContractViolation { stage: Stage::Feeds, .. }
        ));
    }

    #[test]
    fn missing_symbol_is_contract_violation() {
        let mut state = SystemState::new(vec![btc(), eth()]);
        let mut t = tick(1, 100.0, 10.0);
        t.prices.remove(&eth());
        assert!(state.apply_tick(&t).is_err());
        assert!(state.market().is_empty());
    }

    #[test]
    fn unconfigured_symbol_is_contract_violation() {
        let mut state = SystemState::new(vec![btc()]);
        assert!(state.apply_tick(&tick(1, 100.0, 10.0)).is_err());
    }

    #[test]
    fn non_positive_price_is_contract_violation() {
        let mut state = SystemState::new(vec![btc(), eth()]);
        assert!(state.apply_tick(&tick(1, 0.0, 10.0)).is_err());
        assert!(state.apply_tick(&tick(1, f64::NAN, 10.0)).is_err());
    }

    #[test]
    fn order_flow_fills_cache_and_top_of_book() {
        let sim = OrderFlowSimulator::new(1, 5);
        let mut state = SystemState::new(vec![btc(), eth()]).with_cache_limits(CacheLimits {
            orderbook_depth: 3,
            trades_history: 10,
            bar_window: 10,
        });
        let t = tick(1, 100.0, 10.0);
        state.apply_tick(&t).unwrap();
        assert_eq!(state.record_order_flow(&sim.simulate(&t)).unwrap(), 2);

        let cache = state.market_cache(&btc()).unwrap();
        assert_eq!(cache.order_book().unwrap().bids.len(), 3);
        assert_eq!(cache.bar_count(), 1);
        let quote = state.market().quote(&btc()).unwrap();
        assert_eq!(quote.bid, Some(99.95));
        assert_eq!(quote.ask, Some(100.05));

        // the next tick's prices clear the stale book until its flow arrives
        state.apply_tick(&tick(2, 101.0, 10.0)).unwrap();
        assert_eq!(state.market().quote(&btc()).unwrap().bid, None);
    }

    #[test]
    fn feeds_with_order_flow_is_idempotent() {
        let sim = OrderFlowSimulator::new(9, 4);
        let t = tick(1, 100.0, 10.0);

        let mut once = SystemState::new(vec![btc(), eth()]);
        once.apply_tick(&t).unwrap();
        once.record_order_flow(&sim.simulate(&t)).unwrap();

        let mut twice = once.clone();
        twice.apply_tick(&t).unwrap();
        twice.record_order_flow(&sim.simulate(&t)).unwrap();

        assert_eq!(once.market(), twice.market());
        assert_eq!(once.market_cache(&btc()), twice.market_cache(&btc()));
    }

    #[test]
    fn order_flow_for_another_tick_is_contract_violation() {
        let sim = OrderFlowSimulator::new(1, 2);
        let mut state = SystemState::new(vec![btc(), eth()]);
        state.apply_tick(&tick(2, 100.0, 10.0)).unwrap();
        let err = state
            .record_order_flow(&sim.simulate(&tick(1, 100.0, 10.0)))
            .unwrap_err();
        assert!(matches!(
            err,
            TicktraderError::ContractViolation { stage: Stage::Feeds, .. }
        ));
        assert!(state.market_cache(&btc()).is_none());
    }

    #[test]
    fn apply_execution_updates_metrics() {
        let mut state = SystemState::new(vec![btc(), eth()]);
        let t = tick(1, 100.0, 10.0);
        state.apply_execution(&ExecutionResult::noop(), &t);
        assert_eq!(state.metrics().ticks_processed, 1);
        assert_eq!(state.metrics().decisions_made, 0);
        assert!(state.last_decision().is_none());

        let intent = Intent::new(btc(), Action::Buy, "s");
        let decision = Decision::from_intent(&intent).unwrap();
        let t2 = tick(2, 100.0, 10.0);
        state.apply_execution(&ExecutionResult::simulated(&decision, "sim"), &t2);
        assert_eq!(state.metrics().ticks_processed, 2);
        assert_eq!(state.metrics().decisions_made, 1);
        assert_eq!(state.metrics().last_tick_id, Some(2));
        assert_eq!(
            state.metrics().last_execution_status,
            Some(ExecutionStatus::Simulated)
        );
        assert_eq!(state.last_decision(), Some(&decision));
    }

    #[test]
    fn load_seeds_positions_and_tick() {
        let mut state = SystemState::new(vec![btc()]);
        state.load(LoadedState {
            positions: vec![Position {
                symbol: btc(),
                quantity: 1.5,
                entry_price: 100.0,
                opened_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            }],
            orders: vec![],
            last_tick_id: Some(9),
        });
        assert_eq!(state.positions().len(), 1);
        assert_eq!(state.last_tick_id(), Some(9));
    }

    #[test]
    fn snapshot_captures_prices_and_metrics() {
        let mut state = SystemState::new(vec![btc(), eth()]);
        let t = tick(3, 100.0, 10.0);
        state.apply_tick(&t).unwrap();
        state.apply_execution(&ExecutionResult::noop(), &t);
        let snap = state.to_snapshot("local", Utc::now());
        assert_eq!(snap.last_tick_id, 3);
        assert_eq!(snap.last_prices.get(&eth()), Some(&10.0));
        assert_eq!(snap.metrics.ticks_processed, 1);
    }
}
