//! Event sink that forwards stage events to `tracing`.

use tracing::{error, info, warn};

use crate::domain::pipeline::{EventLevel, StageEvent};
use crate::ports::event_sink::EventSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        TracingEventSink
    }
}

impl EventSink for TracingEventSink {
    fn emit(&mut self, event: &StageEvent) {
        let stage = event.stage.as_str();
        match (event.level, event.tick_id) {
            (EventLevel::Info, Some(tick_id)) => info!(stage, tick_id, "{}", event.summary),
            (EventLevel::Info, None) => info!(stage, "{}", event.summary),
            (EventLevel::Warn, Some(tick_id)) => warn!(stage, tick_id, "{}", event.summary),
            (EventLevel::Warn, None) => warn!(stage, "{}", event.summary),
            (EventLevel::Error, Some(tick_id)) => error!(stage, tick_id, "{}", event.summary),
            (EventLevel::Error, None) => error!(stage, "{}", event.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::Stage;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(events: &[StageEvent]) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut sink = TracingEventSink::new();
            for event in events {
                sink.emit(event);
            }
        });
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn records_stage_and_tick_id() {
        let output = capture(&[StageEvent::info(Stage::Feeds, Some(1), "updated 2 symbols")]);
        assert!(output.contains("INFO"));
        assert!(output.contains("FEEDS"));
        assert!(output.contains("tick_id=1"));
        assert!(output.contains("updated 2 symbols"));
    }

    #[test]
    fn levels_follow_event_level() {
        let output = capture(&[
            StageEvent::warn(Stage::Load, None, "no snapshot"),
            StageEvent::error(Stage::Failed, Some(2), "contract violation"),
        ]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("no snapshot"));
        assert!(!lines[0].contains("tick_id"));
        assert!(lines[1].contains("ERROR"));
        assert!(lines[1].contains("tick_id=2"));
    }
}
