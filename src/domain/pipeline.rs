//! Per-tick stage sequencing.
//!
//! [`TickPipeline::process_tick`] runs TICK, FEEDS, IND, CTX, STRAT, ORCH,
//! EXEC and STATE in that order against the store, emitting one
//! [`StageEvent`] per stage. A contract violation aborts the tick with an
//! error; strategy and execution failures do not.

use std::fmt;

use crate::domain::context::TradingContext;
use crate::domain::error::TicktraderError;
use crate::domain::execution::{ExecutionResult, ExecutionStage, ExecutionStatus};
use crate::domain::indicator::IndicatorStage;
use crate::domain::intent::{Decision, Intent};
use crate::domain::market::OrderFlowSimulator;
use crate::domain::orchestrator::Orchestrator;
use crate::domain::state::SystemState;
use crate::domain::strategy::{StrategyFailure, StrategyHub};
use crate::domain::tick::{Tick, TickSource};
use crate::ports::event_sink::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Boot,
    Load,
    Warmup,
    Tick,
    Feeds,
    Ind,
    Ctx,
    Strat,
    Orch,
    Exec,
    State,
    Done,
    Failed,
}

impl Stage {
    /// The stages every tick passes through, in order.
    pub const TICK_SEQUENCE: [Stage; 8] = [
        Stage::Tick,
        Stage::Feeds,
        Stage::Ind,
        Stage::Ctx,
        Stage::Strat,
        Stage::Orch,
        Stage::Exec,
        Stage::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Boot => "BOOT",
            Stage::Load => "LOAD",
            Stage::Warmup => "WARMUP",
            Stage::Tick => "TICK",
            Stage::Feeds => "FEEDS",
            Stage::Ind => "IND",
            Stage::Ctx => "CTX",
            Stage::Strat => "STRAT",
            Stage::Orch => "ORCH",
            Stage::Exec => "EXEC",
            Stage::State => "STATE",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// One structured observability record.
#[derive(Debug, Clone, PartialEq)]
pub struct StageEvent {
    pub stage: Stage,
    pub tick_id: Option<u64>,
    pub level: EventLevel,
    pub summary: String,
}

impl StageEvent {
    pub fn info(stage: Stage, tick_id: Option<u64>, summary: impl Into<String>) -> Self {
        Self::new(stage, tick_id, EventLevel::Info, summary)
    }

    pub fn warn(stage: Stage, tick_id: Option<u64>, summary: impl Into<String>) -> Self {
        Self::new(stage, tick_id, EventLevel::Warn, summary)
    }

    pub fn error(stage: Stage, tick_id: Option<u64>, summary: impl Into<String>) -> Self {
        Self::new(stage, tick_id, EventLevel::Error, summary)
    }

    fn new(stage: Stage, tick_id: Option<u64>, level: EventLevel, summary: impl Into<String>) -> Self {
        StageEvent {
            stage,
            tick_id,
            level,
            summary: summary.into(),
        }
    }
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tick_id {
            Some(id) => write!(f, "[{}] tick={} {}", self.stage, id, self.summary),
            None => write!(f, "[{}] {}", self.stage, self.summary),
        }
    }
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub intents: Vec<Intent>,
    pub failures: Vec<StrategyFailure>,
    pub decision: Option<Decision>,
    pub execution: ExecutionResult,
}

pub struct TickPipeline {
    tick_source: Box<dyn TickSource>,
    indicators: IndicatorStage,
    hub: StrategyHub,
    orchestrator: Orchestrator,
    execution: ExecutionStage,
    order_flow: Option<OrderFlowSimulator>,
}

impl TickPipeline {
    pub fn new(
        tick_source: Box<dyn TickSource>,
        indicators: IndicatorStage,
        hub: StrategyHub,
        orchestrator: Orchestrator,
        execution: ExecutionStage,
    ) -> Self {
        Self {
            tick_source,
            indicators,
            hub,
            orchestrator,
            execution,
            order_flow: None,
        }
    }

    pub fn indicators(&self) -> &IndicatorStage {
        &self.indicators
    }

    pub fn indicators_mut(&mut self) -> &mut IndicatorStage {
        &mut self.indicators
    }

    pub fn hub(&self) -> &StrategyHub {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut StrategyHub {
        &mut self.hub
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn execution(&self) -> &ExecutionStage {
        &self.execution
    }

    pub fn set_execution(&mut self, execution: ExecutionStage) {
        self.execution = execution;
    }

    /// Simulate order flow at FEEDS. `None` records prices only.
    pub fn set_order_flow(&mut self, order_flow: Option<OrderFlowSimulator>) {
        self.order_flow = order_flow;
    }

    pub fn set_tick_source(&mut self, tick_source: Box<dyn TickSource>) {
        self.tick_source = tick_source;
    }

    pub fn process_tick(
        &mut self,
        tick_id: u64,
        state: &mut SystemState,
        sink: &mut dyn EventSink,
    ) -> Result<TickReport, TicktraderError> {
        let id = Some(tick_id);

        // TICK
        let tick = self.tick_source.generate(tick_id, state.symbols())?;
        if tick.id != tick_id {
            return Err(TicktraderError::contract(
                Stage::Tick,
                format!("tick source returned id {} for tick {}", tick.id, tick_id),
            ));
        }
        sink.emit(&StageEvent::info(
            Stage::Tick,
            id,
            format!("generated {} prices", tick.prices.len()),
        ));

        // FEEDS
        let feed = state.apply_tick(&tick)?;
        let mut summary = format!("updated {} symbols, {} changed", feed.symbols, feed.changed);
        if let Some(simulator) = &self.order_flow {
            let recorded = state.record_order_flow(&simulator.simulate(&tick))?;
            summary.push_str(&format!(", order flow for {}", recorded));
        }
        sink.emit(&StageEvent::info(Stage::Feeds, id, summary));

        // IND
        let indicators = self.indicators.compute(state.market(), state.indicators());
        let values: usize = indicators.iter().map(|(_, v)| v.len()).sum();
        state.set_indicators(indicators);
        sink.emit(&StageEvent::info(
            Stage::Ind,
            id,
            format!("{} values across {} symbols", values, state.indicators().len()),
        ));

        // CTX
        let ctx = TradingContext::build(tick_id, state.market(), state.indicators(), state)?;
        sink.emit(&StageEvent::info(
            Stage::Ctx,
            id,
            format!(
                "context for {} symbols, {} positions",
                ctx.symbols().len(),
                ctx.positions.len()
            ),
        ));

        // STRAT
        let evaluation = self.hub.evaluate(&ctx);
        for failure in &evaluation.failures {
            sink.emit(&StageEvent::warn(Stage::Strat, id, failure.to_string()));
        }
        sink.emit(&StageEvent::info(
            Stage::Strat,
            id,
            format!(
                "{} intents from {} strategies, {} failed",
                evaluation.intents.len(),
                self.hub.len(),
                evaluation.failures.len()
            ),
        ));

        // ORCH
        let decision = self.orchestrator.decide(&evaluation.intents);
        let summary = match &decision {
            Some(d) => format!("decision {} ({})", d, self.orchestrator.policy()),
            None => format!("no decision ({})", self.orchestrator.policy()),
        };
        sink.emit(&StageEvent::info(Stage::Orch, id, summary));

        // EXEC
        let execution = self.execution.execute(decision.as_ref());
        let event = if execution.status == ExecutionStatus::Failed {
            StageEvent::warn(Stage::Exec, id, execution.to_string())
        } else {
            StageEvent::info(Stage::Exec, id, execution.to_string())
        };
        sink.emit(&event);

        // STATE
        state.record_strategy_failures(evaluation.failures.len());
        state.apply_execution(&execution, &tick);
        let metrics = state.metrics();
        sink.emit(&StageEvent::info(
            Stage::State,
            id,
            format!(
                "ticks={} decisions={} last_status={}",
                metrics.ticks_processed, metrics.decisions_made, execution.status
            ),
        ));

        Ok(TickReport {
            tick,
            intents: evaluation.intents,
            failures: evaluation.failures,
            decision,
            execution,
        })
    }
}
