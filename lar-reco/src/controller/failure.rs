//! Failure bookkeeping for the event loop.
//!
//! Per-event reconstruction failures are recorded and the run continues;
//! the summary lists which events were processed and which were abandoned.

use crate::core::RecoStage;
use crate::errors::ReconstructionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Record of one abandoned event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The event that failed.
    pub event_number: u64,
    /// Context that raised the error.
    pub context: String,
    /// Stage that failed, if known.
    pub stage: Option<RecoStage>,
    /// Error message.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Additional context.
    pub details: HashMap<String, String>,
}

impl FailureRecord {
    /// Creates a record from a reconstruction error.
    #[must_use]
    pub fn new(event_number: u64, error: &ReconstructionError) -> Self {
        Self {
            event_number,
            context: error.context.clone(),
            stage: error.stage,
            error: error.message.clone(),
            timestamp: Utc::now(),
            details: error.details.clone(),
        }
    }
}

/// Collects processed and failed events over a run.
#[derive(Debug, Default)]
pub struct FailureCollector {
    processed: Vec<u64>,
    failures: Vec<FailureRecord>,
}

impl FailureCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successfully reconstructed event.
    pub fn record_success(&mut self, event_number: u64) {
        self.processed.push(event_number);
    }

    /// Records an abandoned event.
    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    /// Returns true if the event failed.
    #[must_use]
    pub fn has_failed(&self, event_number: u64) -> bool {
        self.failures.iter().any(|f| f.event_number == event_number)
    }

    /// Returns the failure records.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Failure counts keyed by stage name.
    #[must_use]
    pub fn failures_by_stage(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for failure in &self.failures {
            let key = failure
                .stage
                .map_or_else(|| "unknown".to_string(), |s| s.to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Closes the collector into a run summary.
    #[must_use]
    pub fn finish(self, run_id: Uuid, skipped: u64, started_at: DateTime<Utc>) -> RunSummary {
        RunSummary {
            run_id,
            skipped,
            processed: self.processed,
            failures: self.failures,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// Events skipped before processing started.
    pub skipped: u64,
    /// Numbers of events reconstructed successfully, in input order.
    pub processed: Vec<u64>,
    /// Abandoned events, in input order.
    pub failures: Vec<FailureRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Number of events the stager was invoked on.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.processed.len() + self.failures.len()
    }

    /// Numbers of the abandoned events.
    #[must_use]
    pub fn failed_events(&self) -> Vec<u64> {
        self.failures.iter().map(|f| f.event_number).collect()
    }

    /// Returns true if any event failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Fraction of attempted events reconstructed successfully.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        self.processed.len() as f64 / attempted as f64
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("skipped".to_string(), serde_json::json!(self.skipped));
        map.insert("processed".to_string(), serde_json::json!(self.processed.len()));
        map.insert("failed".to_string(), serde_json::json!(self.failures.len()));
        map.insert("success_rate".to_string(), serde_json::json!(self.success_rate()));
        map.insert(
            "duration_ms".to_string(),
            serde_json::json!((self.finished_at - self.started_at).num_milliseconds()),
        );
        map.insert(
            "failures".to_string(),
            serde_json::json!(self
                .failures
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "event_number": f.event_number,
                        "context": f.context,
                        "stage": f.stage,
                        "error": f.error,
                        "timestamp": f.timestamp.to_rfc3339(),
                    })
                })
                .collect::<Vec<_>>()),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(stage: RecoStage) -> ReconstructionError {
        ReconstructionError::in_stage("primary", stage, "boom")
    }

    #[test]
    fn test_record_from_error() {
        let record = FailureRecord::new(4, &error(RecoStage::Slicing).with_detail("k", "v"));
        assert_eq!(record.event_number, 4);
        assert_eq!(record.stage, Some(RecoStage::Slicing));
        assert_eq!(record.context, "primary");
        assert_eq!(record.details.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_collector_summary() {
        let mut collector = FailureCollector::new();
        collector.record_success(0);
        collector.record_failure(FailureRecord::new(1, &error(RecoStage::NeutrinoReco)));
        collector.record_success(2);
        collector.record_failure(FailureRecord::new(3, &error(RecoStage::NeutrinoReco)));

        assert!(collector.has_failed(1));
        assert!(!collector.has_failed(2));
        assert_eq!(collector.failures_by_stage().get("neutrino_reco"), Some(&2));

        let summary = collector.finish(Uuid::new_v4(), 0, Utc::now());
        assert_eq!(summary.attempted(), 4);
        assert_eq!(summary.failed_events(), vec![1, 3]);
        assert!((summary.success_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary() {
        let summary = FailureCollector::new().finish(Uuid::new_v4(), 2, Utc::now());
        assert_eq!(summary.attempted(), 0);
        assert_eq!(summary.success_rate(), 0.0);
        assert!(!summary.has_failures());

        let dict = summary.to_dict();
        assert_eq!(dict.get("skipped"), Some(&serde_json::json!(2)));
        assert_eq!(dict.get("failed"), Some(&serde_json::json!(0)));
    }
}
