//! Per-event stage sequencing.
//!
//! This module provides:
//! - The explicit stage plan with predecessor gating
//! - The stager running one event across the primary and daughter contexts
//! - Per-event and per-slice outcomes

mod outcome;
mod plan;
mod stager;


pub use outcome::{EventOutcome, SliceOutcome};
pub use plan::{PipelinePlan, PipelinePlanBuilder, PlannedStage, StageGate};
pub use stager::PipelineStager;
