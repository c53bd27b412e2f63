//! Run event sinks.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, Level};
use uuid::Uuid;

/// Kinds of events the event loop emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunEventKind {
    /// The stager is about to run on an event.
    #[serde(rename = "event.started")]
    EventStarted,
    /// An event was reconstructed.
    #[serde(rename = "event.completed")]
    EventCompleted,
    /// An event was abandoned after a reconstruction error.
    #[serde(rename = "event.failed")]
    EventFailed,
    /// The event loop finished.
    #[serde(rename = "run.completed")]
    RunCompleted,
}

impl RunEventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventStarted => "event.started",
            Self::EventCompleted => "event.completed",
            Self::EventFailed => "event.failed",
            Self::RunCompleted => "run.completed",
        }
    }
}

impl fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// What happened.
    pub kind: RunEventKind,
    /// The run it happened in.
    pub run_id: Uuid,
    /// The detector event concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_number: Option<u64>,
    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RunEvent {
    /// Creates an event about one detector event.
    #[must_use]
    pub fn for_event(kind: RunEventKind, run_id: Uuid, event_number: u64, data: serde_json::Value) -> Self {
        Self {
            kind,
            run_id,
            event_number: Some(event_number),
            data,
        }
    }

    /// Creates a run-level event.
    #[must_use]
    pub fn for_run(kind: RunEventKind, run_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            kind,
            run_id,
            event_number: None,
            data,
        }
    }
}

/// Receiver of run events.
///
/// Emission must never fail the run; sinks swallow their own errors.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Emits an event.
    fn emit(&self, event: &RunEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &RunEvent) {}
}

/// A sink that logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &RunEvent) {
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.kind,
                run_id = %event.run_id,
                event_number = ?event.event_number,
                data = %event.data,
                "Event: {}", event.kind
            );
        } else {
            info!(
                event_type = %event.kind,
                run_id = %event.run_id,
                event_number = ?event.event_number,
                data = %event.data,
                "Event: {}", event.kind
            );
        }
    }
}

/// A sink keeping every event, for tests and post-run inspection.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<RunEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.read().clone()
    }

    /// Returns events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: RunEventKind) -> Vec<RunEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &RunEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(RunEventKind::EventFailed.to_string(), "event.failed");
        let json = serde_json::to_string(&RunEventKind::RunCompleted).unwrap();
        assert_eq!(json, r#""run.completed""#);
    }

    #[test]
    fn test_noop_and_logging_sinks_accept_events() {
        let event = RunEvent::for_run(RunEventKind::RunCompleted, Uuid::new_v4(), serde_json::json!({}));
        NoOpEventSink.emit(&event);
        LoggingEventSink::default().emit(&event);
        LoggingEventSink::debug().emit(&event);
    }

    #[test]
    fn test_collecting_sink_filters_by_kind() {
        let sink = CollectingEventSink::new();
        let run_id = Uuid::new_v4();
        sink.emit(&RunEvent::for_event(RunEventKind::EventStarted, run_id, 1, serde_json::Value::Null));
        sink.emit(&RunEvent::for_event(RunEventKind::EventCompleted, run_id, 1, serde_json::Value::Null));
        sink.emit(&RunEvent::for_event(RunEventKind::EventStarted, run_id, 2, serde_json::Value::Null));

        assert_eq!(sink.len(), 3);
        let started: Vec<_> = sink
            .of_kind(RunEventKind::EventStarted)
            .iter()
            .filter_map(|e| e.event_number)
            .collect();
        assert_eq!(started, vec![1, 2]);

        sink.clear();
        assert!(sink.is_empty());
    }
}
