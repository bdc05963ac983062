//! Per-symbol market cache and the synthetic order-flow simulator.
//!
//! FEEDS records one [`OrderFlow`] per symbol per tick: a depth-limited
//! order book, one trade and a one-tick OHLCV bar. [`MarketCache`] keeps the
//! latest book and bounded trade and bar histories. Recording the same tick
//! twice leaves the cache as if it had been recorded once.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::domain::symbol::Symbol;
use crate::domain::tick::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub volume: f64,
}

/// Bids best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub tick_id: u64,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn spread(&self) -> Option<f64> {
        Some((self.best_ask()? - self.best_bid()?).max(0.0))
    }

    pub fn mid_price(&self) -> Option<f64> {
        Some((self.best_ask()? + self.best_bid()?) / 2.0)
    }

    fn truncated(&self, depth: usize) -> OrderBook {
        OrderBook {
            tick_id: self.tick_id,
            timestamp: self.timestamp,
            bids: self.bids.iter().take(depth).copied().collect(),
            asks: self.asks.iter().take(depth).copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub tick_id: u64,
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub tick_id: u64,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// What the market did for one symbol during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFlow {
    pub book: OrderBook,
    pub trade: Trade,
    pub bar: Bar,
}

impl OrderFlow {
    pub fn tick_id(&self) -> u64 {
        self.book.tick_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Book levels kept per side.
    pub orderbook_depth: usize,
    pub trades_history: usize,
    pub bar_window: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        CacheLimits {
            orderbook_depth: 20,
            trades_history: 500,
            bar_window: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketCache {
    limits: CacheLimits,
    book: Option<OrderBook>,
    trades: VecDeque<Trade>,
    bars: VecDeque<Bar>,
}

impl MarketCache {
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            limits,
            book: None,
            trades: VecDeque::new(),
            bars: VecDeque::new(),
        }
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn order_book(&self) -> Option<&OrderBook> {
        self.book.as_ref()
    }

    /// The last `limit` trades, oldest first.
    pub fn trades(&self, limit: usize) -> Vec<&Trade> {
        let skip = self.trades.len().saturating_sub(limit);
        self.trades.iter().skip(skip).collect()
    }

    /// The last `limit` bars, oldest first.
    pub fn bars(&self, limit: usize) -> Vec<&Bar> {
        let skip = self.bars.len().saturating_sub(limit);
        self.bars.iter().skip(skip).collect()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn record(&mut self, flow: &OrderFlow) {
        let tick_id = flow.tick_id();
        self.book = Some(flow.book.truncated(self.limits.orderbook_depth));
        if self.trades.back().is_some_and(|t| t.tick_id == tick_id) {
            self.trades.pop_back();
        }
        if self.bars.back().is_some_and(|b| b.tick_id == tick_id) {
            self.bars.pop_back();
        }
        push_bounded(&mut self.trades, flow.trade, self.limits.trades_history);
        push_bounded(&mut self.bars, flow.bar, self.limits.bar_window);
    }
}

fn push_bounded<T>(items: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while items.len() >= capacity {
        items.pop_front();
    }
    items.push_back(item);
}

const MIN_SPREAD: f64 = 0.01;
const SPREAD_FRACTION: f64 = 0.0005;

/// Synthetic order flow around each tick price.
///
/// Level `i` sits `step * (i + 1)` away from the tick price on both sides,
/// where `step = max(price * 0.05%, 0.01)`. Volumes grow with distance and
/// carry seeded jitter. Output depends only on the seed, the tick and the
/// symbol, so replaying a tick reproduces its flow exactly.
#[derive(Debug, Clone)]
pub struct OrderFlowSimulator {
    seed: u64,
    levels: usize,
}

impl OrderFlowSimulator {
    pub const MAX_LEVELS: usize = 10;

    pub fn new(seed: u64, depth: usize) -> Self {
        Self {
            seed,
            levels: depth.clamp(1, Self::MAX_LEVELS),
        }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn simulate(&self, tick: &Tick) -> BTreeMap<Symbol, OrderFlow> {
        tick.prices
            .iter()
            .map(|(symbol, &price)| (symbol.clone(), self.flow_for(symbol, tick, price)))
            .collect()
    }

    fn stream_seed(&self, symbol: &Symbol, tick_id: u64) -> u64 {
        // FNV-1a over the symbol, mixed with seed and tick
        let mut h = self.seed ^ tick_id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        for byte in symbol.as_str().bytes() {
            h = (h ^ u64::from(byte)).wrapping_mul(0x0100_0000_01B3);
        }
        h
    }

    fn flow_for(&self, symbol: &Symbol, tick: &Tick, price: f64) -> OrderFlow {
        let mut rng = ChaCha8Rng::seed_from_u64(self.stream_seed(symbol, tick.id));
        let step = (price * SPREAD_FRACTION).max(MIN_SPREAD);

        let mut bids = Vec::with_capacity(self.levels);
        let mut asks = Vec::with_capacity(self.levels);
        for i in 0..self.levels {
            let offset = step * (i + 1) as f64;
            let base_volume = 1.0 + i as f64;
            let bid = round_to(price - offset, 2);
            if bid > 0.0 {
                bids.push(BookLevel {
                    price: bid,
                    volume: round_to(base_volume * rng.gen_range(0.5..1.5), 4),
                });
            }
            asks.push(BookLevel {
                price: round_to(price + offset, 2),
                volume: round_to(base_volume * rng.gen_range(0.5..1.5), 4),
            });
        }

        let side = if rng.gen_bool(0.5) {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let amount = round_to(rng.gen_range(0.01..1.0), 4);

        OrderFlow {
            book: OrderBook {
                tick_id: tick.id,
                timestamp: tick.timestamp,
                bids,
                asks,
            },
            trade: Trade {
                tick_id: tick.id,
                timestamp: tick.timestamp,
                side,
                price,
                amount,
            },
            bar: Bar {
                tick_id: tick.id,
                timestamp: tick.timestamp,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: amount,
            },
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
