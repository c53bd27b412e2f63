//! Core domain model types.
//!
//! This module contains the data exchanged between the orchestrator and the
//! reconstruction contexts:
//! - Hits, events and slices
//! - Stage kinds, hypotheses and pipeline states
//! - Stage requests, stage results and merged results

mod event;
mod result;
mod status;

pub use event::{Event, Hit, HitId, Slice};
pub use result::{MergedResult, SliceCandidate, StageRequest, StageResult};
pub use status::{Hypothesis, PipelineState, RecoStage};
