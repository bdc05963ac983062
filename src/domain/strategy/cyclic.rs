//! Cyclic demo strategy.
//!
//! Alternates by tick id for every symbol: divisible by 3 sells, otherwise
//! divisible by 2 buys with a fixed budget, otherwise holds.

use crate::domain::context::TradingContext;
use crate::domain::error::StrategyError;
use crate::domain::intent::{Action, Intent, IntentParams};
use crate::domain::strategy::Strategy;

pub struct CyclicDemoStrategy {
    budget: f64,
}

impl CyclicDemoStrategy {
    pub fn new(budget: f64) -> Self {
        Self { budget }
    }
}

impl Strategy for CyclicDemoStrategy {
    fn id(&self) -> &str {
        "cyclic"
    }

    fn evaluate(&mut self, ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError> {
        let mut intents = Vec::with_capacity(ctx.symbols().len());
        for symbol in ctx.symbols() {
            let params = IntentParams {
                reference_price: ctx.price(symbol),
                ..IntentParams::default()
            };
            let intent = if ctx.tick_id % 3 == 0 {
                Intent::new(symbol.clone(), Action::Sell, self.id())
                    .with_confidence(0.4)
                    .with_reason("demo_down")
                    .with_params(params)
            } else if ctx.tick_id % 2 == 0 {
                Intent::new(symbol.clone(), Action::Buy, self.id())
                    .with_confidence(0.7)
                    .with_reason("demo_up")
                    .with_params(IntentParams {
                        budget: Some(self.budget),
                        ..params
                    })
            } else {
                Intent::hold(symbol.clone(), self.id(), "no_signal").with_confidence(0.1)
            };
            intents.push(intent);
        }
        Ok(intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::fixture_state;

    fn run(tick_id: u64) -> Intent {
        let state = fixture_state(tick_id, 101.0, &[]);
        let ctx = TradingContext::build(tick_id, state.market(), state.indicators(), &state).unwrap();
        let mut s = CyclicDemoStrategy::new(100.0);
        let mut intents = s.evaluate(&ctx).unwrap();
        assert_eq!(intents.len(), 1);
        intents.remove(0)
    }

    #[test]
    fn multiple_of_three_sells() {
        let intent = run(3);
        assert_eq!(intent.action, Action::Sell);
        assert_eq!(intent.reason, "demo_down");
        assert!((intent.confidence - 0.4).abs() < 1e-12);
        assert_eq!(intent.params.budget, None);

        // 6 is divisible by both; sell wins
        assert_eq!(run(6).action, Action::Sell);
    }

    #[test]
    fn even_buys_with_budget() {
        let intent = run(2);
        assert_eq!(intent.action, Action::Buy);
        assert_eq!(intent.reason, "demo_up");
        assert_eq!(intent.params.budget, Some(100.0));
        assert_eq!(intent.params.reference_price, Some(101.0));
    }

    #[test]
    fn otherwise_holds() {
        let intent = run(1);
        assert_eq!(intent.action, Action::Hold);
        assert_eq!(intent.reason, "no_signal");
        assert_eq!(run(5).action, Action::Hold);
    }
}
