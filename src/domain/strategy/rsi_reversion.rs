//! RSI mean-reversion strategy: buy oversold, sell overbought.

use crate::domain::context::TradingContext;
use crate::domain::error::StrategyError;
use crate::domain::indicator::IndicatorName;
use crate::domain::intent::{Action, Intent, IntentParams};
use crate::domain::strategy::Strategy;

pub struct RsiReversionStrategy {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl RsiReversionStrategy {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            period,
            oversold,
            overbought,
        }
    }
}

impl Strategy for RsiReversionStrategy {
    fn id(&self) -> &str {
        "rsi_reversion"
    }

    fn evaluate(&mut self, ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError> {
        let mut intents = Vec::new();
        for symbol in ctx.symbols() {
            let rsi = ctx.require_indicator(symbol, IndicatorName::Rsi(self.period))?;
            let params = IntentParams {
                reference_price: ctx.price(symbol),
                ..IntentParams::default()
            };
            let intent = if rsi < self.oversold {
                let depth = (self.oversold - rsi) / self.oversold.max(f64::EPSILON);
                Intent::new(symbol.clone(), Action::Buy, self.id())
                    .with_confidence(0.5 + depth / 2.0)
                    .with_reason("oversold")
            } else if rsi > self.overbought {
                let depth = (rsi - self.overbought) / (100.0 - self.overbought).max(f64::EPSILON);
                Intent::new(symbol.clone(), Action::Sell, self.id())
                    .with_confidence(0.5 + depth / 2.0)
                    .with_reason("overbought")
            } else {
                Intent::hold(symbol.clone(), self.id(), "rsi_neutral").with_confidence(0.1)
            };
            intents.push(intent.with_params(params));
        }
        Ok(intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::fixture_state;

    fn evaluate(rsi: Option<f64>) -> Result<Vec<Intent>, StrategyError> {
        let values: Vec<(IndicatorName, f64)> =
            rsi.map(|v| vec![(IndicatorName::Rsi(14), v)]).unwrap_or_default();
        let state = fixture_state(1, 100.0, &values);
        let ctx = TradingContext::build(1, state.market(), state.indicators(), &state).unwrap();
        RsiReversionStrategy::new(14, 30.0, 70.0).evaluate(&ctx)
    }

    #[test]
    fn oversold_buys() {
        let intents = evaluate(Some(15.0)).unwrap();
        assert_eq!(intents[0].action, Action::Buy);
        assert_eq!(intents[0].reason, "oversold");
        assert!((intents[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn overbought_sells() {
        let intents = evaluate(Some(85.0)).unwrap();
        assert_eq!(intents[0].action, Action::Sell);
        assert!((intents[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn neutral_holds() {
        let intents = evaluate(Some(50.0)).unwrap();
        assert_eq!(intents[0].action, Action::Hold);
    }

    #[test]
    fn missing_rsi_errors() {
        assert!(matches!(
            evaluate(None),
            Err(StrategyError::MissingIndicator { .. })
        ));
    }
}
