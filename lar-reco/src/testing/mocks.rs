//! Mock contexts and providers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::context::{ContextConfig, ContextProvider, ReconstructionContext};
use crate::core::{HitId, Hypothesis, MergedResult, RecoStage, StageRequest, StageResult};
use crate::errors::ReconstructionError;
use crate::geometry::DriftVolume;

/// A recorded stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Stage that was run.
    pub stage: RecoStage,
    /// Event number from the request.
    pub event_number: u64,
    /// Slice index for per-slice stages.
    pub slice_index: Option<usize>,
    /// Hit ids in the request.
    pub hit_ids: Vec<HitId>,
    /// Number of candidates offered to slice identification.
    pub candidate_count: usize,
}

#[derive(Debug, Default)]
struct MockBehaviour {
    fail_on: Option<(RecoStage, Option<u64>)>,
    cosmic_tags: BTreeSet<HitId>,
    slice_size: Option<usize>,
    neutrino_scores: HashMap<usize, f64>,
    particles_per_slice: usize,
}

/// A context that records every call and follows scripted behaviour.
///
/// By default it tags nothing, returns one slice per request, reconstructs
/// no particles and selects the best-scoring candidate.
#[derive(Debug)]
pub struct MockContext {
    name: String,
    behaviour: Mutex<MockBehaviour>,
    calls: Mutex<Vec<RecordedCall>>,
    configs: Mutex<Vec<ContextConfig>>,
    external: Mutex<Vec<(String, String)>>,
    daughters: Mutex<Vec<(u32, Arc<dyn ReconstructionContext>)>>,
    reset_count: Mutex<usize>,
    stitch_count: Mutex<usize>,
    particles: Mutex<usize>,
}

impl MockContext {
    /// Creates a new mock context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: Mutex::new(MockBehaviour::default()),
            calls: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
            external: Mutex::new(Vec::new()),
            daughters: Mutex::new(Vec::new()),
            reset_count: Mutex::new(0),
            stitch_count: Mutex::new(0),
            particles: Mutex::new(0),
        }
    }

    /// Fails the given stage, for every event or only the given one.
    pub fn fail_on(&self, stage: RecoStage, event_number: Option<u64>) {
        self.behaviour.lock().fail_on = Some((stage, event_number));
    }

    /// Tags these hits in the all-hits cosmic pass.
    pub fn tag_cosmic_hits(&self, ids: impl IntoIterator<Item = HitId>) {
        self.behaviour.lock().cosmic_tags = ids.into_iter().collect();
    }

    /// Slices hits into consecutive chunks of this size.
    pub fn set_slice_size(&self, size: usize) {
        self.behaviour.lock().slice_size = Some(size.max(1));
    }

    /// Score returned by neutrino reconstruction of a slice.
    pub fn set_neutrino_score(&self, slice_index: usize, score: f64) {
        self.behaviour.lock().neutrino_scores.insert(slice_index, score);
    }

    /// Particles reported by each per-slice reconstruction.
    pub fn set_particles_per_slice(&self, particles: usize) {
        self.behaviour.lock().particles_per_slice = particles;
    }

    /// Returns every recorded stage call.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded calls for one stage.
    #[must_use]
    pub fn calls_for(&self, stage: RecoStage) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.stage == stage)
            .cloned()
            .collect()
    }

    /// Returns the configurations applied.
    #[must_use]
    pub fn configs(&self) -> Vec<ContextConfig> {
        self.configs.lock().clone()
    }

    /// Returns the external parameters received.
    #[must_use]
    pub fn external_parameters(&self) -> Vec<(String, String)> {
        self.external.lock().clone()
    }

    /// Returns the ids of registered daughters' volumes.
    #[must_use]
    pub fn registered_volumes(&self) -> Vec<u32> {
        self.daughters.lock().iter().map(|(id, _)| *id).collect()
    }

    /// Returns the number of resets.
    #[must_use]
    pub fn reset_count(&self) -> usize {
        *self.reset_count.lock()
    }

    /// Returns the number of stitch calls.
    #[must_use]
    pub fn stitch_count(&self) -> usize {
        *self.stitch_count.lock()
    }

    /// Clears recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl ReconstructionContext for MockContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, config: &ContextConfig) -> Result<(), ReconstructionError> {
        self.configs.lock().push(config.clone());
        Ok(())
    }

    fn set_external_parameters(
        &self,
        parameters: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), ReconstructionError> {
        self.external
            .lock()
            .extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn run_stage(
        &self,
        stage: RecoStage,
        request: &StageRequest,
    ) -> Result<StageResult, ReconstructionError> {
        self.calls.lock().push(RecordedCall {
            stage,
            event_number: request.event_number,
            slice_index: request.slice_index,
            hit_ids: request.hits.iter().map(|h| h.id).collect(),
            candidate_count: request.candidates.len(),
        });

        let behaviour = self.behaviour.lock();
        if let Some((fail_stage, fail_event)) = behaviour.fail_on {
            if fail_stage == stage && fail_event.map_or(true, |e| e == request.event_number) {
                return Err(ReconstructionError::in_stage(&self.name, stage, "scripted failure"));
            }
        }

        let result = match stage {
            RecoStage::AllHitsCosmicReco => StageResult::tagged(
                request
                    .hits
                    .iter()
                    .map(|h| h.id)
                    .filter(|id| behaviour.cosmic_tags.contains(id)),
            ),
            RecoStage::CosmicHitRemoval => StageResult::empty(stage),
            RecoStage::Slicing => {
                let ids: Vec<HitId> = request.hits.iter().map(|h| h.id).collect();
                let size = behaviour.slice_size.unwrap_or(ids.len().max(1));
                StageResult::sliced(ids.chunks(size).map(<[HitId]>::to_vec).collect())
            }
            RecoStage::NeutrinoReco => {
                let score = request
                    .slice_index
                    .and_then(|i| behaviour.neutrino_scores.get(&i).copied());
                StageResult::reconstructed(Hypothesis::Neutrino, behaviour.particles_per_slice, score)
            }
            RecoStage::CosmicReco => {
                StageResult::reconstructed(Hypothesis::Cosmic, behaviour.particles_per_slice, None)
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
        drop(behaviour);

        *self.particles.lock() += result.particle_count;
        Ok(result)
    }

    fn reset(&self) -> Result<(), ReconstructionError> {
        *self.reset_count.lock() += 1;
        *self.particles.lock() = 0;
        Ok(())
    }

    fn register_daughter(
        &self,
        daughter: Arc<dyn ReconstructionContext>,
        volume: &DriftVolume,
    ) -> Result<(), ReconstructionError> {
        self.daughters.lock().push((volume.volume_id, daughter));
        Ok(())
    }

    async fn stitch(&self) -> Result<MergedResult, ReconstructionError> {
        *self.stitch_count.lock() += 1;
        let own = *self.particles.lock();
        let daughters = self.daughters.lock().clone();

        let mut merged = MergedResult::new(own, Vec::new());
        for (volume_id, daughter) in daughters {
            merged.particle_count += daughter.stitch().await?.particle_count;
            merged.contributing_volumes.push(volume_id);
        }
        Ok(merged)
    }
}

/// A provider handing out [`MockContext`]s and keeping them for inspection.
#[derive(Debug, Default)]
pub struct MockProvider {
    created: Mutex<Vec<Arc<MockContext>>>,
    fail_on_create: Mutex<Option<String>>,
}

impl MockProvider {
    /// Creates a new provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes creation of the named context fail.
    pub fn fail_on_create(&self, name: impl Into<String>) {
        *self.fail_on_create.lock() = Some(name.into());
    }

    /// Returns every context created, in creation order.
    #[must_use]
    pub fn created(&self) -> Vec<Arc<MockContext>> {
        self.created.lock().clone()
    }

    /// Returns a created context by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<MockContext>> {
        self.created.lock().iter().find(|c| c.name() == name).cloned()
    }
}

impl ContextProvider for MockProvider {
    fn create(&self, name: &str) -> Result<Arc<dyn ReconstructionContext>, ReconstructionError> {
        if self.fail_on_create.lock().as_deref() == Some(name) {
            return Err(ReconstructionError::new(name, "scripted creation failure"));
        }
        let context = Arc::new(MockContext::new(name));
        self.created.lock().push(context.clone());
        Ok(context)
    }
}
