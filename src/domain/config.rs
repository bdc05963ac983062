//! Pipeline configuration.
//!
//! [`PipelineConfig::default`] is the in-process configuration used when the
//! binary runs without arguments. The driver receives it explicitly and
//! validates it at BOOT.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::error::TicktraderError;
use crate::domain::indicator::sma::SmaLayer;
use crate::domain::market::CacheLimits;
use crate::domain::orchestrator::DecisionPolicy;
use crate::domain::strategy::StrategyKind;
use crate::domain::symbol::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub fast_interval: u64,
    pub medium_interval: u64,
    pub heavy_interval: u64,
    pub fast_window: usize,
    pub medium_window: usize,
    pub heavy_window: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            fast_interval: 1,
            medium_interval: 3,
            heavy_interval: 5,
            fast_window: 5,
            medium_window: 20,
            heavy_window: 100,
            ema_period: 12,
            rsi_period: 14,
        }
    }
}

/// Key of the first window that repeats an earlier one. SMA layers are keyed
/// by window, so two layers sharing one would overwrite each other.
pub fn repeated_window<T: PartialEq>(windows: [(&'static str, T); 3]) -> Option<&'static str> {
    windows
        .iter()
        .enumerate()
        .find(|(i, (_, window))| windows[..*i].iter().any(|(_, earlier)| earlier == window))
        .map(|(_, (key, _))| *key)
}

impl IndicatorConfig {
    pub fn sma_layers(&self) -> Vec<SmaLayer> {
        vec![
            SmaLayer::new(self.fast_window, self.fast_interval),
            SmaLayer::new(self.medium_window, self.medium_interval),
            SmaLayer::new(self.heavy_window, self.heavy_interval),
        ]
    }
}

/// Tunables shared by the built-in strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    /// Minimum fast/slow SMA gap, in percent of the slow SMA.
    pub crossover_threshold_pct: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub order_budget: f64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        StrategySettings {
            crossover_threshold_pct: 0.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            order_budget: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueKind {
    None,
    Simulated,
}

impl FromStr for VenueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(VenueKind::None),
            "simulated" | "sim" => Ok(VenueKind::Simulated),
            other => Err(format!("unknown venue {:?} (expected none or simulated)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub venue: VenueKind,
    pub max_attempts: u32,
    pub timeout: Option<Duration>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            venue: VenueKind::Simulated,
            max_attempts: 3,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    Json,
    Sqlite,
}

impl FromStr for StateBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StateBackend::Json),
            "sqlite" => Ok(StateBackend::Sqlite),
            other => Err(format!("unknown state backend {:?} (expected json or sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateConfig {
    pub backend: StateBackend,
    /// Directory (json) or database file (sqlite). `None` keeps state in memory.
    pub path: Option<PathBuf>,
    /// Save a snapshot every N ticks; 0 disables.
    pub snapshot_interval: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            backend: StateBackend::Json,
            path: None,
            snapshot_interval: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarmupConfig {
    pub history_dir: Option<PathBuf>,
    pub bars: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        WarmupConfig {
            history_dir: None,
            bars: 100,
        }
    }
}

/// Order-flow simulation at FEEDS and the per-symbol cache bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub order_flow: bool,
    pub orderbook_depth: usize,
    pub trades_history: usize,
    pub bar_window: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let limits = CacheLimits::default();
        MarketConfig {
            order_flow: true,
            orderbook_depth: limits.orderbook_depth,
            trades_history: limits.trades_history,
            bar_window: limits.bar_window,
        }
    }
}

impl MarketConfig {
    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits {
            orderbook_depth: self.orderbook_depth,
            trades_history: self.trades_history,
            bar_window: self.bar_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub environment: String,
    pub symbols: Vec<Symbol>,
    pub max_ticks: u64,
    pub tick_sleep: Duration,
    pub seed: u64,
    pub base_price: f64,
    pub volatility_pct: f64,
    /// Log timing statistics every N ticks; 0 disables.
    pub stats_interval: u64,
    pub indicators: IndicatorConfig,
    pub market: MarketConfig,
    pub strategies: Vec<StrategyKind>,
    pub strategy_settings: StrategySettings,
    pub decision_policy: DecisionPolicy,
    pub execution: ExecutionConfig,
    pub state: StateConfig,
    pub warmup: WarmupConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            environment: "local".to_string(),
            symbols: vec![Symbol::pair("BTC", "USDT")],
            max_ticks: 10,
            tick_sleep: Duration::from_millis(200),
            seed: 42,
            base_price: 100.0,
            volatility_pct: 0.1,
            stats_interval: 10,
            indicators: IndicatorConfig::default(),
            market: MarketConfig::default(),
            strategies: vec![StrategyKind::Cyclic],
            strategy_settings: StrategySettings::default(),
            decision_policy: DecisionPolicy::FirstMatch,
            execution: ExecutionConfig::default(),
            state: StateConfig::default(),
            warmup: WarmupConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_tick_sleep(mut self, tick_sleep: Duration) -> Self {
        self.tick_sleep = tick_sleep;
        self
    }

    /// Structural checks, run by the driver at BOOT.
    pub fn validate(&self) -> Result<(), TicktraderError> {
        if self.environment.trim().is_empty() {
            return Err(invalid("pipeline", "environment", "must not be empty"));
        }
        if self.symbols.is_empty() {
            return Err(invalid("pipeline", "symbols", "at least one symbol is required"));
        }
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol) {
                return Err(invalid(
                    "pipeline",
                    "symbols",
                    format!("duplicate symbol {}", symbol),
                ));
            }
        }
        if self.max_ticks == 0 {
            return Err(invalid("pipeline", "max_ticks", "must be at least 1"));
        }
        if !(self.base_price > 0.0) {
            return Err(invalid("pipeline", "base_price", "must be positive"));
        }
        if !(self.volatility_pct >= 0.0) {
            return Err(invalid("pipeline", "volatility_pct", "must not be negative"));
        }

        let ind = &self.indicators;
        for (key, interval) in [
            ("fast_interval", ind.fast_interval),
            ("medium_interval", ind.medium_interval),
            ("heavy_interval", ind.heavy_interval),
        ] {
            if interval == 0 {
                return Err(invalid("indicators", key, "must be at least 1"));
            }
        }
        if ind.fast_interval > ind.medium_interval || ind.medium_interval > ind.heavy_interval {
            return Err(invalid(
                "indicators",
                "medium_interval",
                "intervals must satisfy fast <= medium <= heavy",
            ));
        }
        for (key, window) in [
            ("fast_window", ind.fast_window),
            ("medium_window", ind.medium_window),
            ("heavy_window", ind.heavy_window),
            ("ema_period", ind.ema_period),
            ("rsi_period", ind.rsi_period),
        ] {
            if window == 0 {
                return Err(invalid("indicators", key, "must be at least 1"));
            }
        }
        if let Some(key) = repeated_window([
            ("fast_window", ind.fast_window),
            ("medium_window", ind.medium_window),
            ("heavy_window", ind.heavy_window),
        ]) {
            return Err(invalid(
                "indicators",
                key,
                format!(
                    "fast/medium/heavy windows must differ (got {}/{}/{})",
                    ind.fast_window, ind.medium_window, ind.heavy_window
                ),
            ));
        }

        let market = &self.market;
        for (key, bound) in [
            ("orderbook_depth", market.orderbook_depth),
            ("trades_history", market.trades_history),
            ("bar_window", market.bar_window),
        ] {
            if bound == 0 {
                return Err(invalid("market", key, "must be at least 1"));
            }
        }

        let s = &self.strategy_settings;
        if !(0.0..=100.0).contains(&s.rsi_oversold)
            || !(0.0..=100.0).contains(&s.rsi_overbought)
            || s.rsi_oversold >= s.rsi_overbought
        {
            return Err(invalid(
                "strategies",
                "rsi_oversold",
                "need 0 <= rsi_oversold < rsi_overbought <= 100",
            ));
        }
        if !(s.crossover_threshold_pct >= 0.0) {
            return Err(invalid("strategies", "crossover_threshold_pct", "must not be negative"));
        }

        if self.execution.max_attempts == 0 {
            return Err(invalid("execution", "max_attempts", "must be at least 1"));
        }
        if self.warmup.bars == 0 && self.warmup.history_dir.is_some() {
            return Err(invalid("warmup", "bars", "must be at least 1 when history_dir is set"));
        }
        Ok(())
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TicktraderError {
    TicktraderError::config_invalid(section, key, reason)
}
