//! Domain error types.
//!
//! Only configuration errors and stage contract violations stop a run.
//! Strategy and execution failures are recoverable and never surface here.

use crate::domain::pipeline::Stage;

/// Top-level error type for ticktrader.
#[derive(Debug, thiserror::Error)]
pub enum TicktraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("contract violation at {stage}: {reason}")]
    ContractViolation { stage: Stage, reason: String },

    #[error("state storage error: {reason}")]
    Storage { reason: String },

    #[error("history source error: {reason}")]
    History { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TicktraderError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TicktraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn contract(stage: Stage, reason: impl Into<String>) -> Self {
        TicktraderError::ContractViolation {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            TicktraderError::ConfigParse { .. }
                | TicktraderError::ConfigMissing { .. }
                | TicktraderError::ConfigInvalid { .. }
        )
    }
}

/// Failure of a single strategy during evaluation. Absorbed by the hub.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("insufficient history for {symbol}: have {have} samples, need {need}")]
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("indicator {indicator} missing for {symbol}")]
    MissingIndicator { symbol: String, indicator: String },

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl From<&TicktraderError> for std::process::ExitCode {
    fn from(err: &TicktraderError) -> Self {
        let code: u8 = match err {
            TicktraderError::Io(_) => 1,
            TicktraderError::ConfigParse { .. }
            | TicktraderError::ConfigMissing { .. }
            | TicktraderError::ConfigInvalid { .. } => 2,
            TicktraderError::Storage { .. } => 3,
            TicktraderError::ContractViolation { .. } => 4,
            TicktraderError::History { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
