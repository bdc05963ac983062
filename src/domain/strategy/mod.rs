//! Strategies and the strategy hub (STRAT stage).
//!
//! Strategies are registered in order at boot. The hub concatenates their
//! intents in registration order and isolates failures: a strategy that
//! returns an error is logged and skipped, the others still contribute.

pub mod crossover;
pub mod cyclic;
pub mod rsi_reversion;

use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::domain::config::PipelineConfig;
use crate::domain::context::TradingContext;
use crate::domain::error::StrategyError;
use crate::domain::intent::Intent;

pub use crossover::MaCrossoverStrategy;
pub use cyclic::CyclicDemoStrategy;
pub use rsi_reversion::RsiReversionStrategy;

pub trait Strategy {
    fn id(&self) -> &str;

    fn evaluate(&mut self, ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub strategy_id: String,
    pub error: StrategyError,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strategy {} failed: {}", self.strategy_id, self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyEvaluation {
    pub intents: Vec<Intent>,
    pub failures: Vec<StrategyFailure>,
}

#[derive(Default)]
pub struct StrategyHub {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyHub {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn strategy_ids(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.id().to_string()).collect()
    }

    pub fn evaluate(&mut self, ctx: &TradingContext<'_>) -> StrategyEvaluation {
        let mut evaluation = StrategyEvaluation::default();
        for strategy in self.strategies.iter_mut() {
            match strategy.evaluate(ctx) {
                Ok(intents) => evaluation.intents.extend(intents),
                Err(error) => {
                    warn!(
                        tick_id = ctx.tick_id,
                        strategy = strategy.id(),
                        error = %error,
                        "strategy evaluation failed"
                    );
                    evaluation.failures.push(StrategyFailure {
                        strategy_id: strategy.id().to_string(),
                        error,
                    });
                }
            }
        }
        evaluation
    }
}

/// Built-in strategies selectable by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Cyclic,
    MaCrossover,
    RsiReversion,
}

impl StrategyKind {
    pub fn build(self, config: &PipelineConfig) -> Box<dyn Strategy> {
        let settings = &config.strategy_settings;
        match self {
            StrategyKind::Cyclic => Box::new(CyclicDemoStrategy::new(settings.order_budget)),
            StrategyKind::MaCrossover => Box::new(MaCrossoverStrategy::new(
                config.indicators.fast_window,
                config.indicators.medium_window,
                settings.crossover_threshold_pct,
            )),
            StrategyKind::RsiReversion => Box::new(RsiReversionStrategy::new(
                config.indicators.rsi_period,
                settings.rsi_oversold,
                settings.rsi_overbought,
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Cyclic => write!(f, "cyclic"),
            StrategyKind::MaCrossover => write!(f, "ma_crossover"),
            StrategyKind::RsiReversion => write!(f, "rsi_reversion"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cyclic" => Ok(StrategyKind::Cyclic),
            "ma_crossover" => Ok(StrategyKind::MaCrossover),
            "rsi_reversion" => Ok(StrategyKind::RsiReversion),
            other => Err(format!(
                "unknown strategy {:?} (expected cyclic, ma_crossover or rsi_reversion)",
                other
            )),
        }
    }
}

/// Parse a comma separated strategy list, preserving order.
pub fn parse_strategy_list(input: &str) -> Result<Vec<StrategyKind>, String> {
    input
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// A single-symbol store fed with one tick and the given indicator values.
#[cfg(test)]
pub(crate) fn fixture_state(
    tick_id: u64,
    price: f64,
    values: &[(crate::domain::indicator::IndicatorName, f64)],
) -> crate::domain::state::SystemState {
    use crate::domain::indicator::{IndicatorName, IndicatorSet};
    use crate::domain::state::SystemState;
    use crate::domain::symbol::Symbol;
    use crate::domain::tick::Tick;

    let btc = Symbol::pair("BTC", "USDT");
    let mut state = SystemState::new(vec![btc.clone()]);
    let tick = Tick {
        id: tick_id,
        timestamp: chrono::Utc::now(),
        prices: [(btc.clone(), price)].into_iter().collect(),
    };
    state.apply_tick(&tick).expect("fixture tick");
    let mut set = IndicatorSet::new();
    set.set(&btc, IndicatorName::Price, price);
    for &(name, value) in values {
        set.set(&btc, name, value);
    }
    state.set_indicators(set);
    state
}
