//! The top-level event loop.

use super::failure::{FailureCollector, FailureRecord, RunSummary};
use super::source::EventSource;
use crate::config::Parameters;
use crate::context::ContextSet;
use crate::events::{EventSink, NoOpEventSink, RunEvent, RunEventKind};
use crate::observability::Timer;
use crate::pipeline::{EventOutcome, PipelineStager};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drives the stager over an event stream.
///
/// The first `n_events_to_skip` events are read past without being
/// reconstructed; after that up to `n_events_to_process` events are handed
/// to the stager, or all remaining events if the bound is negative. A
/// failing event is recorded and the loop moves on.
#[derive(Debug)]
pub struct EventLoop<'a> {
    parameters: &'a Parameters,
    contexts: &'a ContextSet,
    stager: &'a PipelineStager,
    sink: Arc<dyn EventSink>,
    run_id: Uuid,
}

impl<'a> EventLoop<'a> {
    /// Creates an event loop reporting to no sink.
    #[must_use]
    pub fn new(parameters: &'a Parameters, contexts: &'a ContextSet, stager: &'a PipelineStager) -> Self {
        Self {
            parameters,
            contexts,
            stager,
            sink: Arc::new(NoOpEventSink),
            run_id: Uuid::new_v4(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Processes events until the bound is reached or the input runs out.
    ///
    /// Never fails: reconstruction errors are recorded per event, malformed
    /// records are logged and passed over, and an unreadable input ends the
    /// run early.
    pub async fn process_events(&self, source: &mut dyn EventSource) -> RunSummary {
        let started_at = Utc::now();
        let timer = Timer::start();
        let mut collector = FailureCollector::new();

        let skipped = self.skip_events(source);
        let limit = self.parameters.event_limit();
        let mut attempted: u64 = 0;

        while limit.map_or(true, |limit| attempted < limit) {
            let event = match source.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Event input failed, stopping");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Passing over malformed event record");
                    attempted += 1;
                    continue;
                }
            };
            attempted += 1;

            if self.parameters.should_display_event_number {
                info!(event_number = event.number, "Processing event");
            }
            self.emit_for(RunEventKind::EventStarted, event.number, serde_json::json!({
                "hits": event.hit_count(),
            }));

            let event_timer = Timer::start();
            match self.stager.process_event(self.contexts, &event).await {
                Ok(outcome) => {
                    self.report_success(&outcome, event_timer.elapsed_ms());
                    collector.record_success(event.number);
                }
                Err(e) => {
                    warn!(
                        event_number = event.number,
                        context = %e.context,
                        stage = ?e.stage,
                        error = %e.message,
                        "Event reconstruction failed, continuing with next event"
                    );
                    self.emit_for(RunEventKind::EventFailed, event.number, serde_json::json!({
                        "context": e.context,
                        "stage": e.stage,
                        "error": e.message,
                    }));
                    collector.record_failure(FailureRecord::new(event.number, &e));
                }
            }
        }

        let summary = collector.finish(self.run_id, skipped, started_at);
        info!(
            run_id = %self.run_id,
            skipped = summary.skipped,
            processed = summary.processed.len(),
            failed = summary.failures.len(),
            duration_ms = timer.elapsed_ms(),
            "Run complete"
        );
        self.sink.emit(&RunEvent::for_run(
            RunEventKind::RunCompleted,
            self.run_id,
            serde_json::json!(summary.to_dict()),
        ));
        summary
    }

    fn skip_events(&self, source: &mut dyn EventSource) -> u64 {
        let mut skipped = 0;
        while skipped < self.parameters.n_events_to_skip {
            match source.skip_event() {
                Ok(true) => skipped += 1,
                Ok(false) => break,
                Err(e) => {
                    error!(error = %e, skipped, "Event input failed while skipping");
                    break;
                }
            }
        }
        skipped
    }

    fn report_success(&self, outcome: &EventOutcome, duration_ms: f64) {
        if self.parameters.print_overall_reco_status {
            info!(
                event_number = outcome.event_number,
                state = %outcome.state,
                stages = outcome.stages_run.len(),
                slices = outcome.slices.len(),
                selected_slice = ?outcome.selected_slice,
                particles = outcome.merged.particle_count,
                duration_ms,
                "Event reconstructed"
            );
        }
        self.emit_for(RunEventKind::EventCompleted, outcome.event_number, serde_json::json!({
            "state": outcome.state,
            "slices": outcome.slices.len(),
            "selected_slice": outcome.selected_slice,
            "particles": outcome.merged.particle_count,
            "duration_ms": duration_ms,
        }));
    }

    fn emit_for(&self, kind: RunEventKind, event_number: u64, data: serde_json::Value) {
        self.sink
            .emit(&RunEvent::for_event(kind, self.run_id, event_number, data));
    }
}

/// Runs the event loop with no event sink.
pub async fn process_events(
    parameters: &Parameters,
    contexts: &ContextSet,
    stager: &PipelineStager,
    source: &mut dyn EventSource,
) -> RunSummary {
    EventLoop::new(parameters, contexts, stager)
        .process_events(source)
        .await
}
