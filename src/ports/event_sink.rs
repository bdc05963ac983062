//! Stage event sink port.
//!
//! The pipeline emits one [`StageEvent`] per stage per tick; where they go
//! (console, file, test capture) is the sink's business.

use crate::domain::pipeline::StageEvent;

pub trait EventSink {
    fn emit(&mut self, event: &StageEvent);
}
