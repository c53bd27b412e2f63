//! Assertions over event outcomes.

use crate::core::{Hypothesis, PipelineState, RecoStage};
use crate::pipeline::EventOutcome;

/// Asserts the exact sequence of stages invoked.
pub fn assert_stages_run(outcome: &EventOutcome, expected: &[RecoStage]) {
    assert_eq!(
        outcome.stages_run, expected,
        "Event {} ran unexpected stages",
        outcome.event_number
    );
}

/// Asserts the event was treated as one slice holding `hit_count` hits.
pub fn assert_single_slice(outcome: &EventOutcome, hit_count: usize) {
    assert_eq!(
        outcome.slices.len(),
        1,
        "Expected one slice in event {}, got {}",
        outcome.event_number,
        outcome.slices.len()
    );
    assert_eq!(outcome.slices[0].hit_count, hit_count);
}

/// Asserts no per-slice hypothesis and no selection ran.
pub fn assert_no_hypotheses(outcome: &EventOutcome) {
    for slice in &outcome.slices {
        assert!(
            slice.neutrino.is_none() && slice.cosmic.is_none(),
            "Slice {} of event {} was reconstructed",
            slice.index,
            outcome.event_number
        );
    }
    assert!(outcome.selected_slice.is_none(), "Unexpected slice selection");
    assert!(!outcome.ran(RecoStage::SliceIdentification));
}

/// Asserts a resolved event has exactly one neutrino slice, the selected one,
/// and that every other slice is cosmic or uninterpreted.
pub fn assert_resolved(outcome: &EventOutcome) {
    assert_eq!(outcome.state, PipelineState::Resolved);
    let selected = outcome
        .selected()
        .unwrap_or_else(|| panic!("Event {} has no selected slice", outcome.event_number));
    assert_eq!(selected.interpretation, Some(Hypothesis::Neutrino));
    assert_eq!(outcome.count_interpreted_as(Hypothesis::Neutrino), 1);
}
