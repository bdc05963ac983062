//! Moving-average crossover strategy.
//!
//! Buys when the fast SMA sits above the slow SMA by more than the threshold,
//! sells when it sits below by more than the threshold. Needs a full slow
//! window of samples before it will trade.

use crate::domain::context::TradingContext;
use crate::domain::error::StrategyError;
use crate::domain::indicator::IndicatorName;
use crate::domain::intent::{Action, Intent, IntentParams};
use crate::domain::strategy::Strategy;

pub struct MaCrossoverStrategy {
    fast: usize,
    slow: usize,
    threshold_pct: f64,
}

impl MaCrossoverStrategy {
    pub fn new(fast: usize, slow: usize, threshold_pct: f64) -> Self {
        Self {
            fast,
            slow,
            threshold_pct,
        }
    }
}

impl Strategy for MaCrossoverStrategy {
    fn id(&self) -> &str {
        "ma_crossover"
    }

    fn evaluate(&mut self, ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError> {
        let mut intents = Vec::new();
        for symbol in ctx.symbols() {
            let have = ctx.samples(symbol);
            if have < self.slow {
                return Err(StrategyError::InsufficientHistory {
                    symbol: symbol.to_string(),
                    have,
                    need: self.slow,
                });
            }
            let fast = ctx.require_indicator(symbol, IndicatorName::Sma(self.fast))?;
            let slow = ctx.require_indicator(symbol, IndicatorName::Sma(self.slow))?;
            if slow <= 0.0 {
                return Err(StrategyError::Evaluation(format!(
                    "non-positive slow SMA {} for {}",
                    slow, symbol
                )));
            }

            let gap_pct = (fast - slow) / slow * 100.0;
            let params = IntentParams {
                reference_price: ctx.price(symbol),
                ..IntentParams::default()
            };
            let confidence = (0.5 + gap_pct.abs() / 10.0).min(1.0);
            let intent = if gap_pct > self.threshold_pct {
                Intent::new(symbol.clone(), Action::Buy, self.id())
                    .with_confidence(confidence)
                    .with_reason("fast_above_slow")
            } else if gap_pct < -self.threshold_pct {
                Intent::new(symbol.clone(), Action::Sell, self.id())
                    .with_confidence(confidence)
                    .with_reason("fast_below_slow")
            } else {
                Intent::hold(symbol.clone(), self.id(), "no_crossover").with_confidence(0.1)
            };
            intents.push(intent.with_params(params));
        }
        Ok(intents)
    }
}
