//! Event sinks for run observability.
//!
//! The event loop reports each detector event's start, completion or failure
//! and the end of the run to an [`EventSink`].

mod sink;

pub use sink::{
    CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RunEvent, RunEventKind,
};
