//! Event loop controller.
//!
//! Reads events from an [`EventSource`], applies the skip and process
//! bounds, runs the [`PipelineStager`](crate::pipeline::PipelineStager) on
//! each event and contains per-event failures.

mod event_loop;
mod failure;
mod source;

pub use event_loop::{process_events, EventLoop};
pub use failure::{FailureCollector, FailureRecord, RunSummary};
pub use source::{EventSource, JsonLinesEventSource, VecEventSource};
