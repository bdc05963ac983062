//! Pipeline driver: BOOT → LOAD → WARMUP → LOOP → DONE / FAILED.
//!
//! The driver owns the store and the collaborators (event sink, venue,
//! state store, history source) and threads them explicitly into each stage.
//! Only configuration errors and contract violations stop a run.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::config::PipelineConfig;
use crate::domain::error::TicktraderError;
use crate::domain::execution::ExecutionStage;
use crate::domain::indicator::ema::EmaComputer;
use crate::domain::indicator::rsi::RsiComputer;
use crate::domain::indicator::sma::MovingAverageComputer;
use crate::domain::indicator::spread::SpreadComputer;
use crate::domain::indicator::{IndicatorComputer, IndicatorSet, IndicatorStage};
use crate::domain::market::OrderFlowSimulator;
use crate::domain::metrics::{PipelineMetrics, StatsWindow};
use crate::domain::orchestrator::Orchestrator;
use crate::domain::pipeline::{Stage, StageEvent, TickPipeline};
use crate::domain::snapshot::{snapshot_key, LoadedState, StateSnapshot};
use crate::domain::state::SystemState;
use crate::domain::strategy::{Strategy, StrategyHub};
use crate::domain::tick::{SyntheticTickSource, TickSource};
use crate::ports::event_sink::EventSink;
use crate::ports::history_port::HistoryPort;
use crate::ports::state_store_port::StateStorePort;
use crate::ports::venue_port::VenuePort;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Boot,
    Load,
    Warmup,
    Running,
    Done,
    Failed,
}

/// Cooperative cancellation, checked between ticks and during the
/// inter-tick sleep. Never interrupts a tick in progress.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub phase: DriverPhase,
    pub ticks_completed: u64,
    pub first_tick_id: Option<u64>,
    pub last_tick_id: Option<u64>,
    pub stopped_early: bool,
    pub metrics: PipelineMetrics,
}

struct DiscardEvents;

impl EventSink for DiscardEvents {
    fn emit(&mut self, _event: &StageEvent) {}
}

/// Process-memory only; LOAD always comes back empty.
struct EphemeralStore;

impl StateStorePort for EphemeralStore {
    fn load(&self, _key: &str) -> Result<LoadedState, TicktraderError> {
        Ok(LoadedState::default())
    }

    fn save(&mut self, _key: &str, _snapshot: &StateSnapshot) -> Result<(), TicktraderError> {
        Ok(())
    }
}

pub struct PipelineDriver {
    config: PipelineConfig,
    phase: DriverPhase,
    state: SystemState,
    pipeline: TickPipeline,
    sink: Box<dyn EventSink>,
    state_store: Box<dyn StateStorePort>,
    history: Option<Box<dyn HistoryPort>>,
    stop: StopHandle,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig) -> Self {
        let tick_source =
            SyntheticTickSource::new(config.seed, config.base_price, config.volatility_pct);

        let computers: Vec<Box<dyn IndicatorComputer>> = vec![
            Box::new(MovingAverageComputer::new(config.indicators.sma_layers())),
            Box::new(EmaComputer::new(config.indicators.ema_period)),
            Box::new(RsiComputer::new(config.indicators.rsi_period)),
            Box::new(SpreadComputer::new()),
        ];

        let strategies = config.strategies.iter().map(|k| k.build(&config)).collect();

        let mut pipeline = TickPipeline::new(
            Box::new(tick_source),
            IndicatorStage::new(computers),
            StrategyHub::new(strategies),
            Orchestrator::new(config.decision_policy),
            Self::execution_stage(&config, None),
        );
        if config.market.order_flow {
            pipeline.set_order_flow(Some(OrderFlowSimulator::new(
                config.seed,
                config.market.orderbook_depth,
            )));
        }

        Self {
            state: SystemState::new(config.symbols.clone())
                .with_cache_limits(config.market.cache_limits()),
            config,
            phase: DriverPhase::Boot,
            pipeline,
            sink: Box::new(DiscardEvents),
            state_store: Box::new(EphemeralStore),
            history: None,
            stop: StopHandle::default(),
        }
    }

    fn execution_stage(config: &PipelineConfig, venue: Option<Box<dyn VenuePort>>) -> ExecutionStage {
        ExecutionStage::new(venue)
            .with_retries(config.execution.max_attempts)
            .with_timeout(config.execution.timeout)
    }

    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_venue(mut self, venue: Box<dyn VenuePort>) -> Self {
        self.pipeline
            .set_execution(Self::execution_stage(&self.config, Some(venue)));
        self
    }

    pub fn with_state_store(mut self, store: Box<dyn StateStorePort>) -> Self {
        self.state_store = store;
        self
    }

    pub fn with_history(mut self, history: Box<dyn HistoryPort>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_tick_source(mut self, source: Box<dyn TickSource>) -> Self {
        self.pipeline.set_tick_source(source);
        self
    }

    /// Registered after the strategies named in the configuration.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.pipeline.hub_mut().register(strategy);
        self
    }

    pub fn with_indicator(mut self, computer: Box<dyn IndicatorComputer>) -> Self {
        self.pipeline.indicators_mut().register(computer);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&mut self, event: StageEvent) {
        self.sink.emit(&event);
    }

    fn fail(&mut self, stage: Stage, tick_id: Option<u64>, err: &TicktraderError) {
        self.phase = DriverPhase::Failed;
        error!(stage = stage.as_str(), tick_id, error = %err, "pipeline failed");
        self.emit(StageEvent::error(Stage::Failed, tick_id, err.to_string()));
    }

    pub fn run(&mut self) -> Result<RunReport, TicktraderError> {
        if self.phase != DriverPhase::Boot {
            return Err(TicktraderError::contract(
                Stage::Boot,
                "driver has already run; create a new one",
            ));
        }

        // BOOT
        if let Err(err) = self.config.validate() {
            self.fail(Stage::Boot, None, &err);
            return Err(err);
        }
        let symbols = self
            .config
            .symbols
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");
        info!(
            environment = %self.config.environment,
            symbols = %symbols,
            max_ticks = self.config.max_ticks,
            tick_sleep_ms = self.config.tick_sleep.as_millis() as u64,
            strategies = ?self.pipeline.hub().strategy_ids(),
            policy = %self.pipeline.orchestrator().policy(),
            "pipeline booting"
        );
        self.emit(StageEvent::info(
            Stage::Boot,
            None,
            format!(
                "environment={} symbols={} max_ticks={} strategies={}",
                self.config.environment,
                symbols,
                self.config.max_ticks,
                self.pipeline.hub().strategy_ids().join(",")
            ),
        ));

        // LOAD
        self.phase = DriverPhase::Load;
        self.load();

        // WARMUP
        self.phase = DriverPhase::Warmup;
        self.warm_up();

        // LOOP
        self.phase = DriverPhase::Running;
        self.run_loop()
    }

    fn load(&mut self) {
        let key = snapshot_key(&self.config.environment, &self.config.symbols);
        match self.state_store.load(&key) {
            Ok(loaded)
                if loaded
                    .last_tick_id
                    .is_some_and(|last| last.checked_add(self.config.max_ticks).is_none()) =>
            {
                let last = loaded.last_tick_id.unwrap_or_default();
                warn!(key = %key, last_tick_id = last, "saved tick counter exhausted, starting fresh");
                self.emit(StageEvent::warn(
                    Stage::Load,
                    None,
                    format!(
                        "saved tick {} leaves no room for {} more ticks, starting fresh",
                        last, self.config.max_ticks
                    ),
                ));
            }
            Ok(loaded) => {
                let summary = match loaded.last_tick_id {
                    Some(last) => format!(
                        "resuming after tick {} with {} positions, {} orders",
                        last,
                        loaded.positions.len(),
                        loaded.orders.len()
                    ),
                    None => "no saved state, starting fresh".to_string(),
                };
                info!(key = %key, "{}", summary);
                self.state.load(loaded);
                self.emit(StageEvent::info(Stage::Load, None, summary));
            }
            Err(err) => {
                warn!(key = %key, error = %err, "state load failed, starting fresh");
                self.emit(StageEvent::warn(
                    Stage::Load,
                    None,
                    format!("load failed, starting fresh: {}", err),
                ));
            }
        }
    }

    fn warm_up(&mut self) {
        let mut set = IndicatorSet::new();
        let mut seeded = 0usize;
        let symbols = self.config.symbols.clone();

        for symbol in &symbols {
            let fetched = self
                .history
                .as_ref()
                .map(|source| source.recent_prices(symbol, self.config.warmup.bars));
            let history = match fetched {
                Some(Ok(prices)) => prices,
                Some(Err(err)) => {
                    warn!(symbol = %symbol, error = %err, "warm-up history unavailable");
                    self.emit(StageEvent::warn(
                        Stage::Warmup,
                        None,
                        format!("{}: using defaults, {}", symbol, err),
                    ));
                    Vec::new()
                }
                None => Vec::new(),
            };
            if !history.is_empty() {
                seeded += 1;
            }
            let values = self.pipeline.indicators_mut().warm_up(symbol, &history);
            debug!(symbol = %symbol, samples = history.len(), "indicators seeded");
            set.insert(symbol.clone(), values);
        }

        self.state.set_indicators(set);
        let summary = format!(
            "{} symbols seeded from history, {} with defaults",
            seeded,
            symbols.len() - seeded
        );
        info!("{}", summary);
        self.emit(StageEvent::info(Stage::Warmup, None, summary));
    }

    fn run_loop(&mut self) -> Result<RunReport, TicktraderError> {
        // LOAD guarantees last + max_ticks fits
        let first_tick_id = self
            .state
            .last_tick_id()
            .and_then(|last| last.checked_add(1))
            .unwrap_or(1);
        let started = Instant::now();
        let mut window = StatsWindow::new(started);
        let mut completed = 0u64;
        let mut stopped_early = false;

        while completed < self.config.max_ticks {
            if self.stop.is_stopped() {
                stopped_early = true;
                break;
            }

            let Some(tick_id) = first_tick_id.checked_add(completed) else {
                let err = TicktraderError::contract(Stage::Tick, "tick id overflow");
                self.fail(Stage::Tick, None, &err);
                return Err(err);
            };
            let tick_started = Instant::now();
            let result = self
                .pipeline
                .process_tick(tick_id, &mut self.state, self.sink.as_mut());
            if let Err(err) = result {
                let stage = match &err {
                    TicktraderError::ContractViolation { stage, .. } => *stage,
                    _ => Stage::Tick,
                };
                self.fail(stage, Some(tick_id), &err);
                self.log_summary(completed, started.elapsed());
                return Err(err);
            }
            window.record(tick_started.elapsed());
            completed += 1;

            let snapshot_interval = self.config.state.snapshot_interval;
            if snapshot_interval > 0 && tick_id % snapshot_interval == 0 {
                self.save_snapshot(tick_id);
            }

            let stats_interval = self.config.stats_interval;
            if stats_interval > 0 && completed % stats_interval == 0 {
                self.log_stats(tick_id, &window);
                window.reset(Instant::now());
            }

            if completed < self.config.max_ticks && !self.config.tick_sleep.is_zero() {
                self.sleep(self.config.tick_sleep);
            }
        }

        self.phase = DriverPhase::Done;
        let report = RunReport {
            phase: self.phase,
            ticks_completed: completed,
            first_tick_id: (completed > 0).then_some(first_tick_id),
            last_tick_id: (completed > 0).then(|| first_tick_id.saturating_add(completed - 1)),
            stopped_early,
            metrics: self.state.metrics().clone(),
        };
        self.log_summary(completed, started.elapsed());
        self.emit(StageEvent::info(
            Stage::Done,
            None,
            format!(
                "{} ticks completed{}",
                completed,
                if stopped_early { " (stopped early)" } else { "" }
            ),
        ));
        Ok(report)
    }

    fn save_snapshot(&mut self, tick_id: u64) {
        let key = snapshot_key(&self.config.environment, &self.config.symbols);
        let snapshot = self.state.to_snapshot(&self.config.environment, Utc::now());
        match self.state_store.save(&key, &snapshot) {
            Ok(()) => debug!(key = %key, tick_id, "state snapshot saved"),
            Err(err) => {
                warn!(key = %key, tick_id, error = %err, "state snapshot failed");
                self.emit(StageEvent::warn(
                    Stage::State,
                    Some(tick_id),
                    format!("snapshot failed: {}", err),
                ));
            }
        }
    }

    fn log_stats(&self, tick_id: u64, window: &StatsWindow) {
        let Some(stats) = window.summary(Instant::now()) else {
            return;
        };
        let first = self.config.symbols.first();
        let price = first.and_then(|s| self.state.market().price(s));
        info!(
            tick_id,
            symbol = first.map(|s| s.as_str()).unwrap_or(""),
            price = price.unwrap_or(0.0),
            tps = stats.ticks_per_second,
            avg_ms = stats.avg_ms,
            min_ms = stats.min_ms,
            max_ms = stats.max_ms,
            "tick stats"
        );
    }

    fn log_summary(&self, completed: u64, runtime: Duration) {
        let secs = runtime.as_secs_f64();
        let avg_tps = if secs > 0.0 { completed as f64 / secs } else { 0.0 };
        info!(
            ticks = completed,
            runtime_s = secs,
            avg_tps = avg_tps,
            decisions = self.state.metrics().decisions_made,
            "run finished"
        );
    }

    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        loop {
            if self.stop.is_stopped() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
