//! Stage requests and results exchanged with reconstruction contexts.

use super::{Hit, HitId, Hypothesis, RecoStage, Slice};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Input handed to a context for one stage invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageRequest {
    /// The event being processed.
    pub event_number: u64,
    /// Hits the stage operates on.
    #[serde(default)]
    pub hits: Vec<Hit>,
    /// Slice being reconstructed, for per-slice stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_index: Option<usize>,
    /// Candidate slices with their neutrino results, for slice identification.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<SliceCandidate>,
}

impl StageRequest {
    /// Creates a request over a hit collection.
    #[must_use]
    pub fn for_hits(event_number: u64, hits: Vec<Hit>) -> Self {
        Self {
            event_number,
            hits,
            slice_index: None,
            candidates: Vec::new(),
        }
    }

    /// Creates a request for a single slice.
    #[must_use]
    pub fn for_slice(event_number: u64, slice: &Slice) -> Self {
        Self {
            event_number,
            hits: slice.hits.clone(),
            slice_index: Some(slice.index),
            candidates: Vec::new(),
        }
    }

    /// Creates a slice identification request.
    #[must_use]
    pub fn for_selection(event_number: u64, candidates: Vec<SliceCandidate>) -> Self {
        Self {
            event_number,
            hits: Vec::new(),
            slice_index: None,
            candidates,
        }
    }
}

/// A slice offered to slice identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceCandidate {
    /// Slice index within the event.
    pub slice_index: usize,
    /// Number of hits in the slice.
    pub hit_count: usize,
    /// The slice's neutrino-hypothesis result.
    pub neutrino: StageResult,
    /// The slice's cosmic-hypothesis result, if it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmic: Option<StageResult>,
}

/// The outcome of one stage invocation.
///
/// Only the fields relevant to the stage kind are populated; the factory
/// constructors below build each shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage that produced the result.
    pub stage: RecoStage,

    /// Hits tagged as cosmic-ray background.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tagged_hits: BTreeSet<HitId>,

    /// Hit partitions produced by slicing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slices: Vec<Vec<HitId>>,

    /// Number of reconstructed particles.
    #[serde(default)]
    pub particle_count: usize,

    /// Hypothesis score, higher is more neutrino-like.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Slice chosen by slice identification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_slice: Option<usize>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StageResult {
    /// Creates an empty result for a stage.
    #[must_use]
    pub fn empty(stage: RecoStage) -> Self {
        Self {
            stage,
            tagged_hits: BTreeSet::new(),
            slices: Vec::new(),
            particle_count: 0,
            score: None,
            selected_slice: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates an all-hits cosmic result tagging the given hits.
    #[must_use]
    pub fn tagged(tagged_hits: impl IntoIterator<Item = HitId>) -> Self {
        Self {
            tagged_hits: tagged_hits.into_iter().collect(),
            ..Self::empty(RecoStage::AllHitsCosmicReco)
        }
    }

    /// Creates a slicing result.
    #[must_use]
    pub fn sliced(slices: Vec<Vec<HitId>>) -> Self {
        Self {
            slices,
            ..Self::empty(RecoStage::Slicing)
        }
    }

    /// Creates a per-slice reconstruction result.
    #[must_use]
    pub fn reconstructed(hypothesis: Hypothesis, particle_count: usize, score: Option<f64>) -> Self {
        Self {
            particle_count,
            score,
            ..Self::empty(hypothesis.stage())
        }
    }

    /// Creates a slice identification result.
    #[must_use]
    pub fn selected(selected_slice: Option<usize>) -> Self {
        Self {
            selected_slice,
            ..Self::empty(RecoStage::SliceIdentification)
        }
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Detector-wide output assembled by the primary context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedResult {
    /// Number of particles after stitching.
    pub particle_count: usize,
    /// Volumes that contributed, in registration order.
    #[serde(default)]
    pub contributing_volumes: Vec<u32>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MergedResult {
    /// Creates a merged result.
    #[must_use]
    pub fn new(particle_count: usize, contributing_volumes: Vec<u32>) -> Self {
        Self {
            particle_count,
            contributing_volumes,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_result() {
        let result = StageResult::tagged([4, 2, 4]);
        assert_eq!(result.stage, RecoStage::AllHitsCosmicReco);
        assert_eq!(result.tagged_hits.len(), 2);
    }

    #[test]
    fn test_reconstructed_result_uses_hypothesis_stage() {
        let result = StageResult::reconstructed(Hypothesis::Cosmic, 3, Some(0.1));
        assert_eq!(result.stage, RecoStage::CosmicReco);
        assert_eq!(result.particle_count, 3);
    }

    #[test]
    fn test_empty_fields_are_not_serialized() {
        let json = serde_json::to_value(StageResult::selected(Some(2))).unwrap();
        assert_eq!(json["selected_slice"], 2);
        assert!(json.get("tagged_hits").is_none());
        assert!(json.get("slices").is_none());
    }

    #[test]
    fn test_slice_request_carries_index() {
        let slice = Slice::new(5, Some(0), vec![Hit::at(1, 0.0, 0.0, 0.0)]);
        let request = StageRequest::for_slice(9, &slice);
        assert_eq!(request.slice_index, Some(5));
        assert_eq!(request.hits.len(), 1);
    }
}
