#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ticktrader::domain::config::PipelineConfig;
use ticktrader::domain::context::TradingContext;
use ticktrader::domain::driver::StopHandle;
use ticktrader::domain::error::{StrategyError, TicktraderError};
use ticktrader::domain::execution::{ExecutionResult, ExecutionStatus};
use ticktrader::domain::intent::{Action, Decision, Intent};
use ticktrader::domain::snapshot::{LoadedState, StateSnapshot};
use ticktrader::domain::strategy::Strategy;
use ticktrader::domain::symbol::Symbol;
use ticktrader::domain::tick::{Tick, TickSource};
use ticktrader::ports::state_store_port::StateStorePort;
use ticktrader::ports::venue_port::VenuePort;

pub fn btc() -> Symbol {
    Symbol::pair("BTC", "USDT")
}

pub fn eth() -> Symbol {
    Symbol::pair("ETH", "USDT")
}

/// No sleep, no snapshots, no strategies beyond the ones a test registers.
pub fn test_config(symbols: Vec<Symbol>, max_ticks: u64) -> PipelineConfig {
    let mut config = PipelineConfig::default()
        .with_symbols(symbols)
        .with_max_ticks(max_ticks)
        .with_tick_sleep(Duration::ZERO);
    config.strategies.clear();
    config.state.snapshot_interval = 0;
    config.stats_interval = 0;
    config
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Venue returning a fixed sequence of statuses (then repeating the last),
/// recording every decision it sees. Clones share the record.
#[derive(Clone)]
pub struct MockVenue {
    script: Vec<ExecutionStatus>,
    delay: Duration,
    pub submitted: Arc<Mutex<Vec<Decision>>>,
}

impl MockVenue {
    pub fn new(script: Vec<ExecutionStatus>) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn accepting() -> Self {
        Self::new(vec![ExecutionStatus::Sent])
    }

    /// Accepts everything, but only answers after `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::accepting()
        }
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.submitted.lock().unwrap().clone()
    }
}

impl VenuePort for MockVenue {
    fn name(&self) -> &str {
        "mock"
    }

    fn submit(&mut self, decision: &Decision) -> ExecutionResult {
        let idx = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(decision.clone());
            (submitted.len() - 1).min(self.script.len().saturating_sub(1))
        };
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match self.script.get(idx).copied().unwrap_or(ExecutionStatus::Sent) {
            ExecutionStatus::Failed => ExecutionResult::failed(decision, "venue rejected"),
            ExecutionStatus::Simulated => ExecutionResult::simulated(decision, "mock simulated"),
            ExecutionStatus::Sent => ExecutionResult::sent(decision, "mock accepted"),
        }
    }
}

/// Emits the same intents every tick.
pub struct FixedIntents {
    pub id: String,
    pub intents: Vec<(Symbol, Action, f64)>,
}

impl FixedIntents {
    pub fn new(id: &str, intents: Vec<(Symbol, Action, f64)>) -> Self {
        Self {
            id: id.to_string(),
            intents,
        }
    }
}

impl Strategy for FixedIntents {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&mut self, _ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError> {
        Ok(self
            .intents
            .iter()
            .map(|(symbol, action, confidence)| {
                Intent::new(symbol.clone(), *action, &self.id).with_confidence(*confidence)
            })
            .collect())
    }
}

/// Always fails.
pub struct FailingStrategy;

impl Strategy for FailingStrategy {
    fn id(&self) -> &str {
        "broken"
    }

    fn evaluate(&mut self, _ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError> {
        Err(StrategyError::Evaluation("division by zero".into()))
    }
}

/// Requests a stop while evaluating tick `at`.
pub struct StopAt {
    pub handle: StopHandle,
    pub at: u64,
}

impl Strategy for StopAt {
    fn id(&self) -> &str {
        "stopper"
    }

    fn evaluate(&mut self, ctx: &TradingContext<'_>) -> Result<Vec<Intent>, StrategyError> {
        if ctx.tick_id == self.at {
            self.handle.stop();
        }
        Ok(Vec::new())
    }
}

/// Deterministic ticks; drops `drop_symbol` from tick `drop_at` onwards.
pub struct ScriptedTicks {
    pub drop_at: Option<u64>,
    pub drop_symbol: Option<Symbol>,
}

impl ScriptedTicks {
    pub fn steady() -> Self {
        Self {
            drop_at: None,
            drop_symbol: None,
        }
    }

    pub fn dropping(symbol: Symbol, at: u64) -> Self {
        Self {
            drop_at: Some(at),
            drop_symbol: Some(symbol),
        }
    }
}

impl TickSource for ScriptedTicks {
    fn generate(&mut self, tick_id: u64, symbols: &[Symbol]) -> Result<Tick, TicktraderError> {
        let mut prices = BTreeMap::new();
        for (i, symbol) in symbols.iter().enumerate() {
            let dropped = self.drop_at.is_some_and(|at| tick_id >= at)
                && self.drop_symbol.as_ref() == Some(symbol);
            if !dropped {
                prices.insert(symbol.clone(), 100.0 * (i + 1) as f64 + tick_id as f64);
            }
        }
        Ok(Tick {
            id: tick_id,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(tick_id as i64),
            prices,
        })
    }
}

/// Store whose every operation fails.
pub struct BrokenStore;

impl StateStorePort for BrokenStore {
    fn load(&self, _key: &str) -> Result<LoadedState, TicktraderError> {
        Err(TicktraderError::Storage {
            reason: "disk on fire".into(),
        })
    }

    fn save(&mut self, _key: &str, _snapshot: &StateSnapshot) -> Result<(), TicktraderError> {
        Err(TicktraderError::Storage {
            reason: "disk on fire".into(),
        })
    }
}
