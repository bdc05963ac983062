//! Pipeline counters and tick timing statistics.
//!
//! [`PipelineMetrics`] lives in the store and is folded forward at STATE.
//! [`StatsWindow`] measures per-tick processing time between periodic
//! statistics reports.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::domain::execution::ExecutionStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub ticks_processed: u64,
    pub decisions_made: u64,
    pub strategy_failures: u64,
    pub executions_simulated: u64,
    pub executions_sent: u64,
    pub executions_failed: u64,
    pub last_tick_id: Option<u64>,
    pub last_execution_status: Option<ExecutionStatus>,
}

impl PipelineMetrics {
    pub fn record_execution(&mut self, status: ExecutionStatus) {
        match status {
            ExecutionStatus::Simulated => self.executions_simulated += 1,
            ExecutionStatus::Sent => self.executions_sent += 1,
            ExecutionStatus::Failed => self.executions_failed += 1,
        }
        self.last_execution_status = Some(status);
    }
}

/// Timing summary over one statistics window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStats {
    pub ticks: u64,
    pub ticks_per_second: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone)]
pub struct StatsWindow {
    started: Instant,
    ticks: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl StatsWindow {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            ticks: 0,
            total: Duration::ZERO,
            min: None,
            max: Duration::ZERO,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.ticks += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = self.max.max(elapsed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// `None` when nothing was recorded since the last reset.
    pub fn summary(&self, now: Instant) -> Option<TickStats> {
        let min = self.min?;
        let window = now.saturating_duration_since(self.started).as_secs_f64();
        let ticks_per_second = if window > 0.0 {
            self.ticks as f64 / window
        } else {
            0.0
        };
        Some(TickStats {
            ticks: self.ticks,
            ticks_per_second,
            avg_ms: as_ms(self.total) / self.ticks as f64,
            min_ms: as_ms(min),
            max_ms: as_ms(self.max),
        })
    }

    pub fn reset(&mut self, now: Instant) {
        *self = StatsWindow::new(now);
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
