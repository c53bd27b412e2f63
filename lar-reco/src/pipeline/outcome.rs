//! Per-event results reported by the stager.

use crate::core::{Hypothesis, MergedResult, PipelineState, RecoStage, StageResult};
use serde::{Deserialize, Serialize};

/// Everything the pipeline produced for one slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceOutcome {
    /// Slice index within the event.
    pub index: usize,
    /// Volume the slice was reconstructed in, `None` for the primary.
    pub volume_id: Option<u32>,
    /// Number of hits in the slice.
    pub hit_count: usize,
    /// Neutrino-hypothesis result, if it ran.
    pub neutrino: Option<StageResult>,
    /// Cosmic-hypothesis result, if it ran.
    pub cosmic: Option<StageResult>,
    /// The interpretation the slice ends up with.
    pub interpretation: Option<Hypothesis>,
}

impl SliceOutcome {
    /// Returns the result for a hypothesis.
    #[must_use]
    pub fn result(&self, hypothesis: Hypothesis) -> Option<&StageResult> {
        match hypothesis {
            Hypothesis::Neutrino => self.neutrino.as_ref(),
            Hypothesis::Cosmic => self.cosmic.as_ref(),
        }
    }

    /// Returns the result backing the slice's interpretation.
    #[must_use]
    pub fn interpreted_result(&self) -> Option<&StageResult> {
        self.interpretation.and_then(|h| self.result(h))
    }
}

/// The outcome of running the pipeline over one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    /// The event number.
    pub event_number: u64,
    /// The state the event reached.
    pub state: PipelineState,
    /// Stages invoked, in order, each listed once.
    pub stages_run: Vec<RecoStage>,
    /// Hits tagged by the all-hits cosmic pass.
    pub tagged_hits: usize,
    /// Hits removed before slicing.
    pub removed_hits: usize,
    /// Hits outside every drift volume.
    pub unassigned_hits: usize,
    /// Per-slice outcomes in slice order.
    pub slices: Vec<SliceOutcome>,
    /// Slice chosen as the neutrino interaction.
    pub selected_slice: Option<usize>,
    /// Output stitched together by the primary context.
    pub merged: MergedResult,
}

impl EventOutcome {
    /// Returns true if the stage was invoked.
    #[must_use]
    pub fn ran(&self, stage: RecoStage) -> bool {
        self.stages_run.contains(&stage)
    }

    /// Returns the selected slice's outcome.
    #[must_use]
    pub fn selected(&self) -> Option<&SliceOutcome> {
        self.selected_slice
            .and_then(|index| self.slices.iter().find(|s| s.index == index))
    }

    /// Number of slices given an interpretation.
    #[must_use]
    pub fn count_interpreted_as(&self, hypothesis: Hypothesis) -> usize {
        self.slices
            .iter()
            .filter(|s| s.interpretation == Some(hypothesis))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(index: usize, interpretation: Option<Hypothesis>) -> SliceOutcome {
        SliceOutcome {
            index,
            volume_id: None,
            hit_count: 1,
            neutrino: Some(StageResult::reconstructed(Hypothesis::Neutrino, 2, Some(0.5))),
            cosmic: None,
            interpretation,
        }
    }

    #[test]
    fn test_selected_slice_lookup() {
        let outcome = EventOutcome {
            event_number: 1,
            state: PipelineState::Resolved,
            stages_run: vec![RecoStage::NeutrinoReco, RecoStage::SliceIdentification],
            tagged_hits: 0,
            removed_hits: 0,
            unassigned_hits: 0,
            slices: vec![slice(0, None), slice(1, Some(Hypothesis::Neutrino))],
            selected_slice: Some(1),
            merged: MergedResult::default(),
        };

        assert_eq!(outcome.selected().map(|s| s.index), Some(1));
        assert!(outcome.ran(RecoStage::SliceIdentification));
        assert!(!outcome.ran(RecoStage::Slicing));
        assert_eq!(outcome.count_interpreted_as(Hypothesis::Neutrino), 1);
    }

    #[test]
    fn test_interpreted_result() {
        let neutrino = slice(0, Some(Hypothesis::Neutrino));
        let cosmic = slice(1, Some(Hypothesis::Cosmic));
        assert_eq!(neutrino.interpreted_result().map(|r| r.particle_count), Some(2));
        assert!(cosmic.interpreted_result().is_none());
    }
}
