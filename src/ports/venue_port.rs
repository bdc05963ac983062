//! Trading venue port trait.
//!
//! A venue never returns an error: rejections and transport failures are
//! reported as `ExecutionStatus::Failed` results. Venues are `Send` so a
//! submission can run on a worker thread under a timeout.

use crate::domain::execution::ExecutionResult;
use crate::domain::intent::Decision;

pub trait VenuePort: Send {
    fn name(&self) -> &str;

    fn submit(&mut self, decision: &Decision) -> ExecutionResult;
}
