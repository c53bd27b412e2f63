//! Explicit definition of the per-event stage sequence.
//!
//! The plan is an ordered list of optional stages, each with the
//! predecessors it needs. Gating is resolved once from the stage switches,
//! so the per-event code only asks whether a stage runs.

use crate::config::StageToggles;
use crate::core::RecoStage;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Whether a planned stage will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "gate")]
pub enum StageGate {
    /// The stage runs.
    Enabled,
    /// The stage was switched off.
    Disabled,
    /// The stage was switched on but a predecessor is off, so there is
    /// nothing for it to act on.
    Inert {
        /// The first predecessor that does not run.
        missing: RecoStage,
    },
}

impl fmt::Display for StageGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Inert { missing } => write!(f, "inert (requires {missing})"),
        }
    }
}

/// One stage of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    /// The stage.
    pub stage: RecoStage,
    /// Stages that must run for this one to have any effect.
    pub requires: Vec<RecoStage>,
    /// Whether the switch for this stage is on.
    pub switched_on: bool,
    /// Resolved gate.
    pub gate: StageGate,
}

impl PlannedStage {
    /// Creates a planned stage from its switch.
    #[must_use]
    pub fn new(stage: RecoStage, switched_on: bool) -> Self {
        Self {
            stage,
            requires: Vec::new(),
            switched_on,
            gate: if switched_on {
                StageGate::Enabled
            } else {
                StageGate::Disabled
            },
        }
    }

    /// Adds a predecessor requirement.
    #[must_use]
    pub fn requires(mut self, stage: RecoStage) -> Self {
        self.requires.push(stage);
        self
    }

    /// Returns true if the stage runs.
    #[must_use]
    pub fn runs(&self) -> bool {
        self.gate == StageGate::Enabled
    }
}

/// Builder that validates stage order and predecessor declarations.
#[derive(Debug, Clone, Default)]
pub struct PipelinePlanBuilder {
    stages: Vec<PlannedStage>,
}

impl PipelinePlanBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is already planned, requires itself, or
    /// requires a stage not planned before it.
    pub fn stage(mut self, planned: PlannedStage) -> Result<Self, ConfigurationError> {
        if self.stages.iter().any(|s| s.stage == planned.stage) {
            return Err(ConfigurationError::invalid(
                "pipeline",
                format!("stage '{}' planned twice", planned.stage),
            ));
        }
        for required in &planned.requires {
            if *required == planned.stage {
                return Err(ConfigurationError::invalid(
                    "pipeline",
                    format!("stage '{}' cannot require itself", planned.stage),
                ));
            }
            if !self.stages.iter().any(|s| s.stage == *required) {
                return Err(ConfigurationError::invalid(
                    "pipeline",
                    format!(
                        "stage '{}' requires '{}' which is not planned before it",
                        planned.stage, required
                    ),
                ));
            }
        }
        self.stages.push(planned);
        Ok(self)
    }

    /// Resolves gates in order and builds the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if no stages were planned.
    pub fn build(mut self) -> Result<PipelinePlan, ConfigurationError> {
        if self.stages.is_empty() {
            return Err(ConfigurationError::invalid("pipeline", "no stages planned"));
        }

        for i in 0..self.stages.len() {
            if !self.stages[i].switched_on {
                continue;
            }
            let missing = self.stages[i].requires.iter().copied().find(|required| {
                !self.stages[..i]
                    .iter()
                    .any(|s| s.stage == *required && s.runs())
            });
            if let Some(missing) = missing {
                self.stages[i].gate = StageGate::Inert { missing };
            }
        }

        Ok(PipelinePlan {
            stages: self.stages,
        })
    }
}

/// Resolved stage sequence for every event of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePlan {
    stages: Vec<PlannedStage>,
}

impl PipelinePlan {
    /// Builds the standard reconstruction plan from the stage switches.
    ///
    /// Inert stages are reported once here as configuration inconsistencies;
    /// they never fail a run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the standard definition is itself invalid.
    pub fn from_toggles(toggles: &StageToggles) -> Result<Self, ConfigurationError> {
        let plan = PipelinePlanBuilder::new()
            .stage(PlannedStage::new(
                RecoStage::AllHitsCosmicReco,
                toggles.should_run_all_hits_cosmic_reco,
            ))?
            .stage(
                PlannedStage::new(RecoStage::CosmicHitRemoval, toggles.should_run_cosmic_hit_removal)
                    .requires(RecoStage::AllHitsCosmicReco),
            )?
            .stage(PlannedStage::new(RecoStage::Slicing, toggles.should_run_slicing))?
            .stage(PlannedStage::new(
                RecoStage::NeutrinoReco,
                toggles.should_run_neutrino_reco_option,
            ))?
            .stage(PlannedStage::new(
                RecoStage::CosmicReco,
                toggles.should_run_cosmic_reco_option,
            ))?
            .stage(
                PlannedStage::new(
                    RecoStage::SliceIdentification,
                    toggles.should_identify_neutrino_slice,
                )
                .requires(RecoStage::NeutrinoReco),
            )?
            .build()?;

        for planned in plan.inert_stages() {
            if let StageGate::Inert { missing } = planned.gate {
                warn!(
                    stage = %planned.stage,
                    requires = %missing,
                    "Stage is switched on but its predecessor is off; it will do nothing"
                );
            }
        }
        Ok(plan)
    }

    /// Returns every planned stage in order.
    #[must_use]
    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    /// Returns the planned entry for a stage.
    #[must_use]
    pub fn get(&self, stage: RecoStage) -> Option<&PlannedStage> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Returns true if the stage runs.
    #[must_use]
    pub fn runs(&self, stage: RecoStage) -> bool {
        self.get(stage).is_some_and(PlannedStage::runs)
    }

    /// Stages that run, in order.
    #[must_use]
    pub fn enabled_stages(&self) -> Vec<RecoStage> {
        self.stages.iter().filter(|s| s.runs()).map(|s| s.stage).collect()
    }

    /// Stages switched on whose predecessors are off.
    pub fn inert_stages(&self) -> impl Iterator<Item = &PlannedStage> {
        self.stages
            .iter()
            .filter(|s| matches!(s.gate, StageGate::Inert { .. }))
    }

    /// Per-slice hypotheses that run, neutrino first.
    #[must_use]
    pub fn per_slice_stages(&self) -> Vec<RecoStage> {
        self.stages
            .iter()
            .filter(|s| s.stage.is_per_slice() && s.runs())
            .map(|s| s.stage)
            .collect()
    }
}
