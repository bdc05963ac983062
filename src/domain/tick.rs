//! Market ticks and the synthetic tick source.
//!
//! A [`Tick`] is created once per loop iteration and never mutated after.
//! [`SyntheticTickSource`] produces a seeded random walk per symbol so runs
//! are reproducible in tests.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};

use crate::domain::error::TicktraderError;
use crate::domain::pipeline::Stage;
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub prices: BTreeMap<Symbol, f64>,
}

impl Tick {
    pub fn price(&self, symbol: &Symbol) -> Option<f64> {
        self.prices.get(symbol).copied()
    }
}

/// Producer of one tick per loop iteration.
pub trait TickSource {
    fn generate(&mut self, tick_id: u64, symbols: &[Symbol]) -> Result<Tick, TicktraderError>;
}

/// Where tick timestamps come from.
#[derive(Debug, Clone, PartialEq)]
pub enum TickClock {
    Wall,
    /// `start + step * tick_id`, for reproducible runs.
    Fixed {
        start: DateTime<Utc>,
        step: Duration,
    },
}

impl TickClock {
    fn timestamp(&self, tick_id: u64) -> Result<DateTime<Utc>, TicktraderError> {
        match self {
            TickClock::Wall => Ok(Utc::now()),
            TickClock::Fixed { start, step } => i64::try_from(tick_id)
                .ok()
                .and_then(|n| step.num_nanoseconds()?.checked_mul(n))
                .and_then(|nanos| start.checked_add_signed(Duration::nanoseconds(nanos)))
                .ok_or_else(|| {
                    TicktraderError::contract(
                        Stage::Tick,
                        format!("tick {} is outside the fixed clock's range", tick_id),
                    )
                }),
        }
    }
}

const MIN_PRICE: f64 = 0.01;

/// Random-walk tick generator.
///
/// Each symbol starts somewhere in `[base_price, base_price * 1.1)` and moves
/// by at most `volatility_pct` percent per tick. Prices are rounded to cents.
pub struct SyntheticTickSource {
    rng: ChaCha8Rng,
    base_price: f64,
    volatility_pct: f64,
    prices: HashMap<Symbol, f64>,
    clock: TickClock,
}

impl SyntheticTickSource {
    pub fn new(seed: u64, base_price: f64, volatility_pct: f64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            base_price,
            volatility_pct,
            prices: HashMap::new(),
            clock: TickClock::Wall,
        }
    }

    pub fn with_clock(mut self, clock: TickClock) -> Self {
        self.clock = clock;
        self
    }

    fn next_price(&mut self, symbol: &Symbol) -> f64 {
        let current = match self.prices.get(symbol) {
            Some(&p) => p,
            None => self.base_price * (1.0 + self.rng.gen_range(0.0..0.1)),
        };
        let step = if self.volatility_pct > 0.0 {
            let bound = self.volatility_pct / 100.0;
            self.rng.gen_range(-bound..=bound)
        } else {
            0.0
        };
        let next = round_cents(current * (1.0 + step)).max(MIN_PRICE);
        self.prices.insert(symbol.clone(), next);
        next
    }
}

impl TickSource for SyntheticTickSource {
    fn generate(&mut self, tick_id: u64, symbols: &[Symbol]) -> Result<Tick, TicktraderError> {
        if symbols.is_empty() {
            return Err(TicktraderError::config_invalid(
                "pipeline",
                "symbols",
                "tick source needs at least one symbol",
            ));
        }

        let mut prices = BTreeMap::new();
        for symbol in symbols {
            let price = self.next_price(symbol);
            prices.insert(symbol.clone(), price);
        }

        Ok(Tick {
            id: tick_id,
            timestamp: self.clock.timestamp(tick_id)?,
            prices,
        })
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
