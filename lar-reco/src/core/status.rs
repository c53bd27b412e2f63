//! Stage kinds, reconstruction hypotheses and per-event pipeline states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reconstruction stage the orchestrator can ask a context to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoStage {
    /// Cosmic-ray pass over the full, unsliced hit set.
    AllHitsCosmicReco,
    /// Removal of hits tagged by the all-hits cosmic pass.
    CosmicHitRemoval,
    /// Partition of the remaining hits into candidate interaction regions.
    Slicing,
    /// Neutrino-hypothesis reconstruction of one slice.
    NeutrinoReco,
    /// Cosmic-hypothesis reconstruction of one slice.
    CosmicReco,
    /// Choice of the most neutrino-like slice.
    SliceIdentification,
}

impl RecoStage {
    /// All stages in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::AllHitsCosmicReco,
        Self::CosmicHitRemoval,
        Self::Slicing,
        Self::NeutrinoReco,
        Self::CosmicReco,
        Self::SliceIdentification,
    ];

    /// Returns true for stages run once per slice.
    #[must_use]
    pub fn is_per_slice(&self) -> bool {
        matches!(self, Self::NeutrinoReco | Self::CosmicReco)
    }

    /// Returns the hypothesis a per-slice stage reconstructs under.
    #[must_use]
    pub fn hypothesis(&self) -> Option<Hypothesis> {
        match self {
            Self::NeutrinoReco => Some(Hypothesis::Neutrino),
            Self::CosmicReco => Some(Hypothesis::Cosmic),
            _ => None,
        }
    }
}

impl fmt::Display for RecoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllHitsCosmicReco => write!(f, "all_hits_cosmic_reco"),
            Self::CosmicHitRemoval => write!(f, "cosmic_hit_removal"),
            Self::Slicing => write!(f, "slicing"),
            Self::NeutrinoReco => write!(f, "neutrino_reco"),
            Self::CosmicReco => write!(f, "cosmic_reco"),
            Self::SliceIdentification => write!(f, "slice_identification"),
        }
    }
}

/// The interpretation a slice was reconstructed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hypothesis {
    /// Neutrino interaction.
    Neutrino,
    /// Cosmic-ray background.
    Cosmic,
}

impl Hypothesis {
    /// Returns the per-slice stage reconstructing this hypothesis.
    #[must_use]
    pub fn stage(&self) -> RecoStage {
        match self {
            Self::Neutrino => RecoStage::NeutrinoReco,
            Self::Cosmic => RecoStage::CosmicReco,
        }
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neutrino => write!(f, "neutrino"),
            Self::Cosmic => write!(f, "cosmic"),
        }
    }
}

/// Where an event stands in the staged pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Hits loaded, nothing run yet.
    Loaded,
    /// The all-hits cosmic pass has tagged hits.
    CosmicTagged,
    /// The hit set has been partitioned into slices.
    Sliced,
    /// Per-slice hypotheses have been reconstructed.
    Reconstructed,
    /// A neutrino slice has been chosen.
    Resolved,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Loaded
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::CosmicTagged => write!(f, "cosmic_tagged"),
            Self::Sliced => write!(f, "sliced"),
            Self::Reconstructed => write!(f, "reconstructed"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

impl PipelineState {
    /// Returns true once a slice has been selected.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }
}
