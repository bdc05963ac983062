//! Local venue simulator.
//!
//! Accepts every decision and reports it SIMULATED with a sequential
//! `sim-N` order id.

use tracing::info;

use crate::domain::execution::ExecutionResult;
use crate::domain::intent::Decision;
use crate::ports::venue_port::VenuePort;

#[derive(Debug, Default)]
pub struct SimulatedVenue {
    next_order: u64,
}

impl SimulatedVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_submitted(&self) -> u64 {
        self.next_order
    }
}

impl VenuePort for SimulatedVenue {
    fn name(&self) -> &str {
        "simulated"
    }

    fn submit(&mut self, decision: &Decision) -> ExecutionResult {
        self.next_order += 1;
        let order_id = format!("sim-{}", self.next_order);
        let params = &decision.source_intent.params;
        let price = params
            .reference_price
            .map(|p| format!(" @ {:.2}", p))
            .unwrap_or_default();
        let detail = format!("order {} {} {}{}", order_id, decision.action, decision.symbol, price);
        info!(order_id = %order_id, decision = %decision, "simulated order");
        ExecutionResult::simulated(decision, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionStatus;
    use crate::domain::intent::{Action, Intent, IntentParams};
    use crate::domain::symbol::Symbol;

    fn decision(price: Option<f64>) -> Decision {
        let intent = Intent::new(Symbol::pair("BTC", "USDT"), Action::Buy, "t").with_params(
            IntentParams {
                reference_price: price,
                ..IntentParams::default()
            },
        );
        Decision::from_intent(&intent).unwrap()
    }

    #[test]
    fn assigns_sequential_order_ids() {
        let mut venue = SimulatedVenue::new();
        let first = venue.submit(&decision(Some(101.234)));
        let second = venue.submit(&decision(None));
        assert_eq!(first.status, ExecutionStatus::Simulated);
        assert_eq!(first.detail, "order sim-1 BUY BTC/USDT @ 101.23");
        assert_eq!(second.detail, "order sim-2 BUY BTC/USDT");
        assert_eq!(venue.orders_submitted(), 2);
    }
}
