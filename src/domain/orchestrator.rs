//! Decision selection (ORCH stage).
//!
//! The policy is a replaceable value. `FirstMatch` takes the first non-HOLD
//! intent and stops scanning. `HighestConfidence` takes the most confident
//! non-HOLD intent, earliest on ties. Neither uses randomness.

use std::fmt;
use std::str::FromStr;

use crate::domain::intent::{Decision, Intent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionPolicy {
    #[default]
    FirstMatch,
    HighestConfidence,
}

impl DecisionPolicy {
    pub fn decide(&self, intents: &[Intent]) -> Option<Decision> {
        let chosen = match self {
            DecisionPolicy::FirstMatch => intents.iter().find(|i| i.action.is_actionable()),
            DecisionPolicy::HighestConfidence => {
                intents
                    .iter()
                    .filter(|i| i.action.is_actionable())
                    .fold(None, |best: Option<&Intent>, i| match best {
                        Some(b) if b.confidence >= i.confidence => Some(b),
                        _ => Some(i),
                    })
            }
        };
        chosen.and_then(Decision::from_intent)
    }
}

impl fmt::Display for DecisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionPolicy::FirstMatch => write!(f, "first_match"),
            DecisionPolicy::HighestConfidence => write!(f, "highest_confidence"),
        }
    }
}

impl FromStr for DecisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first_match" => Ok(DecisionPolicy::FirstMatch),
            "highest_confidence" => Ok(DecisionPolicy::HighestConfidence),
            other => Err(format!(
                "unknown decision policy {:?} (expected first_match or highest_confidence)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    policy: DecisionPolicy,
}

impl Orchestrator {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DecisionPolicy) {
        self.policy = policy;
    }

    pub fn decide(&self, intents: &[Intent]) -> Option<Decision> {
        self.policy.decide(intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::Action;
    use crate::domain::symbol::Symbol;

    fn intent(symbol: &str, action: Action, confidence: f64) -> Intent {
        Intent::new(Symbol::parse(symbol).unwrap(), action, "t").with_confidence(confidence)
    }

    fn sample() -> Vec<Intent> {
        vec![
            intent("A/USD", Action::Hold, 0.9),
            intent("A/USD", Action::Hold, 0.9),
            intent("A/USD", Action::Buy, 0.3),
            intent("B/USD", Action::Sell, 0.8),
        ]
    }

    #[test]
    fn first_match_picks_first_actionable() {
        let decision = Orchestrator::default().decide(&sample()).unwrap();
        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.symbol.as_str(), "A/USD");
        assert_eq!(decision.source_intent, sample()[2]);
    }

    #[test]
    fn all_hold_yields_none() {
        let intents = vec![intent("A/USD", Action::Hold, 1.0), intent("A/USD", Action::Hold, 1.0)];
        assert!(Orchestrator::default().decide(&intents).is_none());
        assert!(
            Orchestrator::new(DecisionPolicy::HighestConfidence)
                .decide(&intents)
                .is_none()
        );
    }

    #[test]
    fn empty_yields_none() {
        assert!(Orchestrator::default().decide(&[]).is_none());
    }

    #[test]
    fn first_match_is_deterministic() {
        let orch = Orchestrator::default();
        let first = orch.decide(&sample());
        for _ in 0..10 {
            assert_eq!(orch.decide(&sample()), first);
        }
    }

    #[test]
    fn highest_confidence_picks_max() {
        let decision = Orchestrator::new(DecisionPolicy::HighestConfidence)
            .decide(&sample())
            .unwrap();
        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.symbol.as_str(), "B/USD");
    }

    #[test]
    fn highest_confidence_ties_go_to_earliest() {
        let intents = vec![
            intent("A/USD", Action::Sell, 0.5),
            intent("B/USD", Action::Buy, 0.5),
        ];
        let decision = Orchestrator::new(DecisionPolicy::HighestConfidence)
            .decide(&intents)
            .unwrap();
        assert_eq!(decision.symbol.as_str(), "A/USD");
    }

    #[test]
    fn policy_parses() {
        assert_eq!("first_match".parse::<DecisionPolicy>(), Ok(DecisionPolicy::FirstMatch));
        assert_eq!(
            "Highest_Confidence".parse::<DecisionPolicy>(),
            Ok(DecisionPolicy::HighestConfidence)
        );
        assert!("risk_adjusted".parse::<DecisionPolicy>().is_err());
        assert_eq!(DecisionPolicy::HighestConfidence.to_string(), "highest_confidence");
    }
}
