//! Trading intents and decisions.
//!
//! Strategies emit [`Intent`]s; the orchestrator authorizes at most one of
//! them per tick as a [`Decision`]. A decision is never `HOLD`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn is_actionable(self) -> bool {
        self != Action::Hold
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Order parameters a strategy may attach to an intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentParams {
    pub amount: Option<f64>,
    pub budget: Option<f64>,
    /// Price observed by the strategy when the intent was formed.
    pub reference_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub symbol: Symbol,
    pub action: Action,
    pub strategy_id: String,
    pub confidence: f64,
    pub reason: String,
    pub params: IntentParams,
}

impl Intent {
    pub fn new(symbol: Symbol, action: Action, strategy_id: &str) -> Self {
        Intent {
            symbol,
            action,
            strategy_id: strategy_id.to_string(),
            confidence: 0.0,
            reason: String::new(),
            params: IntentParams::default(),
        }
    }

    pub fn hold(symbol: Symbol, strategy_id: &str, reason: &str) -> Self {
        Intent::new(symbol, Action::Hold, strategy_id).with_reason(reason)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = reason.to_string();
        self
    }

    pub fn with_params(mut self, params: IntentParams) -> Self {
        self.params = params;
        self
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) by {} @{:.2}",
            self.action, self.symbol, self.strategy_id, self.confidence
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: Symbol,
    pub action: Action,
    pub source_intent: Intent,
}

impl Decision {
    /// `None` for `HOLD` intents: holding is the absence of a decision.
    pub fn from_intent(intent: &Intent) -> Option<Self> {
        if !intent.action.is_actionable() {
            return None;
        }
        Some(Decision {
            symbol: intent.symbol.clone(),
            action: intent.action,
            source_intent: intent.clone(),
        })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (from {})",
            self.action, self.symbol, self.source_intent.strategy_id
        )
    }
}
