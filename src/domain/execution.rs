//! Decision execution (EXEC stage).
//!
//! Every tick yields exactly one [`ExecutionResult`]. Without a decision it
//! is a SIMULATED no-op; without a venue the decision is logged and reported
//! SIMULATED. Venue rejections are retried and finally reported as FAILED,
//! never raised as errors. A submission that outlives the timeout is FAILED
//! at once: its outcome is unknown, so it is never sent again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::intent::Decision;
use crate::ports::venue_port::VenuePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Simulated,
    Sent,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Simulated => write!(f, "SIMULATED"),
            ExecutionStatus::Sent => write!(f, "SENT"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub decision: Option<Decision>,
    pub status: ExecutionStatus,
    pub detail: String,
    pub attempts: u32,
}

impl ExecutionResult {
    pub fn noop() -> Self {
        ExecutionResult {
            decision: None,
            status: ExecutionStatus::Simulated,
            detail: "no decision".to_string(),
            attempts: 0,
        }
    }

    pub fn simulated(decision: &Decision, detail: impl Into<String>) -> Self {
        Self::with_status(decision, ExecutionStatus::Simulated, detail)
    }

    pub fn sent(decision: &Decision, detail: impl Into<String>) -> Self {
        Self::with_status(decision, ExecutionStatus::Sent, detail)
    }

    pub fn failed(decision: &Decision, detail: impl Into<String>) -> Self {
        Self::with_status(decision, ExecutionStatus::Failed, detail)
    }

    fn with_status(decision: &Decision, status: ExecutionStatus, detail: impl Into<String>) -> Self {
        ExecutionResult {
            decision: Some(decision.clone()),
            status,
            detail: detail.into(),
            attempts: 1,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.decision.is_none()
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.decision {
            Some(d) => write!(f, "{} {}: {}", self.status, d, self.detail),
            None => write!(f, "{} no-op: {}", self.status, self.detail),
        }
    }
}

type SharedVenue = Arc<Mutex<Box<dyn VenuePort>>>;

/// Outcome of one bounded submission attempt.
enum Attempt {
    Answered(ExecutionResult),
    /// No answer within the limit. The order may still have been placed.
    TimedOut,
    /// The venue could not take the submission at all.
    Unavailable(&'static str),
}

pub struct ExecutionStage {
    venue: Option<SharedVenue>,
    venue_name: Option<String>,
    max_attempts: u32,
    timeout: Option<Duration>,
}

impl ExecutionStage {
    pub fn new(venue: Option<Box<dyn VenuePort>>) -> Self {
        Self {
            venue_name: venue.as_deref().map(|v| v.name().to_string()),
            venue: venue.map(|v| Arc::new(Mutex::new(v))),
            max_attempts: 1,
            timeout: None,
        }
    }

    /// Only attempts the venue itself reports FAILED are retried.
    pub fn with_retries(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Bound each submission. An attempt with no answer within `timeout` is
    /// FAILED and never resubmitted; a late answer is logged and dropped.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn venue_name(&self) -> Option<&str> {
        self.venue_name.as_deref()
    }

    pub fn execute(&mut self, decision: Option<&Decision>) -> ExecutionResult {
        let Some(decision) = decision else {
            return ExecutionResult::noop();
        };

        let Some(venue) = self.venue.as_ref() else {
            info!(decision = %decision, "would submit order (no venue configured)");
            return ExecutionResult::simulated(decision, "no venue configured");
        };
        let venue_name = self.venue_name.as_deref().unwrap_or("venue");

        let mut last = ExecutionResult::failed(decision, "not attempted");
        for attempt in 1..=self.max_attempts {
            let outcome = match self.timeout {
                Some(limit) => submit_within(venue, decision, limit),
                None => submit_inline(venue, decision),
            };

            let mut result = match outcome {
                Attempt::Answered(result) => result,
                Attempt::TimedOut => {
                    let limit = self.timeout.unwrap_or_default();
                    let mut result = ExecutionResult::failed(
                        decision,
                        format!("timed out after {}ms, outcome unknown", limit.as_millis()),
                    );
                    result.attempts = attempt;
                    warn!(
                        venue = venue_name,
                        attempt,
                        limit_ms = limit.as_millis() as u64,
                        "venue did not answer in time, not resubmitting"
                    );
                    return result;
                }
                Attempt::Unavailable(reason) => {
                    let mut result = ExecutionResult::failed(decision, reason);
                    result.attempts = attempt;
                    warn!(venue = venue_name, attempt, reason, "venue unavailable");
                    return result;
                }
            };
            result.attempts = attempt;

            if result.status != ExecutionStatus::Failed {
                return result;
            }
            warn!(
                venue = venue_name,
                attempt,
                max_attempts = self.max_attempts,
                detail = %result.detail,
                "execution attempt failed"
            );
            last = result;
        }
        last
    }
}

fn submit_inline(venue: &SharedVenue, decision: &Decision) -> Attempt {
    match venue.lock() {
        Ok(mut venue) => Attempt::Answered(venue.submit(decision)),
        Err(_) => Attempt::Unavailable("venue poisoned by an earlier panic"),
    }
}

/// Submit on a worker thread and wait at most `limit` for the answer. The
/// venue stays locked until the worker returns, so a hung venue turns every
/// later submission into `Unavailable` instead of a second order.
fn submit_within(venue: &SharedVenue, decision: &Decision, limit: Duration) -> Attempt {
    let (tx, rx) = mpsc::channel();
    let venue = Arc::clone(venue);
    let order = decision.clone();

    let spawned = thread::Builder::new()
        .name("venue-submit".to_string())
        .spawn(move || {
            let outcome = match venue.try_lock() {
                Ok(mut venue) => Attempt::Answered(venue.submit(&order)),
                Err(TryLockError::WouldBlock) => {
                    Attempt::Unavailable("venue still busy with an earlier submission")
                }
                Err(TryLockError::Poisoned(_)) => {
                    Attempt::Unavailable("venue poisoned by an earlier panic")
                }
            };
            if let Err(mpsc::SendError(Attempt::Answered(late))) = tx.send(outcome) {
                warn!(result = %late, "venue answered after the timeout; result discarded");
            }
        });
    if spawned.is_err() {
        return Attempt::Unavailable("could not start venue submission");
    }

    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => Attempt::TimedOut,
        Err(RecvTimeoutError::Disconnected) => {
            Attempt::Unavailable("venue submission panicked")
        }
    }
}
