//! A reconstruction context that performs no reconstruction.
//!
//! Useful to exercise the orchestration end to end without an engine: it
//! tags nothing, returns every hit set as one slice, reconstructs no particles
//! and picks the best-scoring candidate slice, which with uniform scores is
//! the first.

use super::{ContextConfig, ContextProvider, ContextRole, ReconstructionContext};
use crate::core::{HitId, MergedResult, RecoStage, StageRequest, StageResult};
use crate::errors::ReconstructionError;
use crate::geometry::DriftVolume;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct PassThroughState {
    roles: Vec<ContextRole>,
    volume_ids: Vec<u32>,
    external: BTreeMap<String, String>,
    daughters: Vec<(u32, Arc<dyn ReconstructionContext>)>,
    particles: usize,
}

/// Context that passes hits through untouched.
#[derive(Debug)]
pub struct PassThroughContext {
    name: String,
    state: Mutex<PassThroughState>,
}

impl PassThroughContext {
    /// Creates a new, unconfigured context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(PassThroughState::default()),
        }
    }

    /// Roles applied so far, in order.
    #[must_use]
    pub fn roles(&self) -> Vec<ContextRole> {
        self.state.lock().roles.clone()
    }

    /// Volume ids visible to the context.
    #[must_use]
    pub fn volume_ids(&self) -> Vec<u32> {
        self.state.lock().volume_ids.clone()
    }

    /// External parameters received.
    #[must_use]
    pub fn external_parameters(&self) -> BTreeMap<String, String> {
        self.state.lock().external.clone()
    }

    fn ensure_configured(&self, stage: RecoStage) -> Result<(), ReconstructionError> {
        if self.state.lock().roles.is_empty() {
            return Err(ReconstructionError::in_stage(
                &self.name,
                stage,
                "context used before configuration",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ReconstructionContext for PassThroughContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, config: &ContextConfig) -> Result<(), ReconstructionError> {
        let mut state = self.state.lock();
        state.roles.push(config.role);
        state.volume_ids = config.volumes.iter().map(|v| v.volume_id).collect();
        debug!(
            context = %self.name,
            role = ?config.role,
            settings = %config.settings_file.display(),
            "Configured pass-through context"
        );
        Ok(())
    }

    fn set_external_parameters(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), ReconstructionError> {
        self.state.lock().external.extend(
            parameters.iter().map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(())
    }

    async fn run_stage(
        &self,
        stage: RecoStage,
        request: &StageRequest,
    ) -> Result<StageResult, ReconstructionError> {
        self.ensure_configured(stage)?;

        let result = match stage {
            RecoStage::AllHitsCosmicReco => StageResult::tagged(std::iter::empty::<HitId>()),
            RecoStage::CosmicHitRemoval => StageResult::empty(stage),
            RecoStage::Slicing => {
                if request.hits.is_empty() {
                    StageResult::sliced(Vec::new())
                } else {
                    StageResult::sliced(vec![request.hits.iter().map(|h| h.id).collect()])
                }
            }
            RecoStage::NeutrinoReco | RecoStage::CosmicReco => {
                let hypothesis = stage.hypothesis().ok_or_else(|| {
                    ReconstructionError::in_stage(&self.name, stage, "stage has no hypothesis")
                })?;
                StageResult::reconstructed(hypothesis, 0, Some(0.0))
            }
            RecoStage::SliceIdentification => {
                let mut best: Option<(usize, f64)> = None;
                for candidate in &request.candidates {
                    let score = candidate.neutrino.score.unwrap_or(0.0);
                    if best.map_or(true, |(_, s)| score > s) {
                        best = Some((candidate.slice_index, score));
                    }
                }
                StageResult::selected(best.map(|(index, _)| index))
            }
        };

        self.state.lock().particles += result.particle_count;
        Ok(result)
    }

    fn reset(&self) -> Result<(), ReconstructionError> {
        self.state.lock().particles = 0;
        Ok(())
    }

    fn register_daughter(
        &self,
        daughter: Arc<dyn ReconstructionContext>,
        volume: &DriftVolume,
    ) -> Result<(), ReconstructionError> {
        self.state.lock().daughters.push((volume.volume_id, daughter));
        Ok(())
    }

    async fn stitch(&self) -> Result<MergedResult, ReconstructionError> {
        let (own, daughters) = {
            let state = self.state.lock();
            (state.particles, state.daughters.clone())
        };

        if daughters.is_empty() {
            return Ok(MergedResult::new(own, Vec::new()));
        }

        let mut merged = MergedResult::new(own, Vec::with_capacity(daughters.len()));
        for (volume_id, daughter) in daughters {
            let part = daughter.stitch().await?;
            merged.particle_count += part.particle_count;
            merged.contributing_volumes.push(volume_id);
        }
        Ok(merged)
    }
}

/// Provider of [`PassThroughContext`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughProvider;

impl ContextProvider for PassThroughProvider {
    fn create(&self, name: &str) -> Result<Arc<dyn ReconstructionContext>, ReconstructionError> {
        Ok(Arc::new(PassThroughContext::new(name)))
    }
}
