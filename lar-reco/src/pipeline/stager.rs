//! Per-event stage sequencing across the primary and daughter contexts.

use super::outcome::{EventOutcome, SliceOutcome};
use super::plan::PipelinePlan;
use crate::config::Parameters;
use crate::context::{ContextSet, ReconstructionContext, Worker};
use crate::core::{
    Event, Hit, HitId, Hypothesis, PipelineState, RecoStage, Slice, SliceCandidate, StageRequest,
    StageResult,
};
use crate::errors::{ConfigurationError, ReconstructionError};
use crate::geometry::DriftVolumeList;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

/// Hits a worker continues with after the cosmic passes.
struct WorkerHits<'a> {
    worker: Worker<'a>,
    hits: Vec<Hit>,
}

/// Bookkeeping for one event as it moves through the stages.
#[derive(Debug, Default)]
struct Progress {
    state: PipelineState,
    stages_run: Vec<RecoStage>,
    tagged_hits: usize,
    removed_hits: usize,
}

impl Progress {
    fn record(&mut self, stage: RecoStage) {
        if !self.stages_run.contains(&stage) {
            self.stages_run.push(stage);
        }
    }

    fn advance(&mut self, state: PipelineState) {
        self.state = self.state.max(state);
    }
}

/// Runs the staged reconstruction of single events.
///
/// The stager is built once per run. It holds the resolved plan and the
/// geometry used to route hits to the daughter contexts; the contexts
/// themselves are passed in per event.
#[derive(Debug, Clone)]
pub struct PipelineStager {
    plan: PipelinePlan,
    volumes: DriftVolumeList,
    slice_workers: usize,
}

impl PipelineStager {
    /// Creates a stager that reconstructs one slice at a time.
    #[must_use]
    pub fn new(plan: PipelinePlan, volumes: DriftVolumeList) -> Self {
        Self {
            plan,
            volumes,
            slice_workers: 1,
        }
    }

    /// Creates a stager from the run parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage plan cannot be built.
    pub fn from_parameters(
        parameters: &Parameters,
        volumes: DriftVolumeList,
    ) -> Result<Self, ConfigurationError> {
        let plan = PipelinePlan::from_toggles(&parameters.toggles)?;
        Ok(Self::new(plan, volumes).with_slice_workers(parameters.slice_workers))
    }

    /// Sets how many slices may be reconstructed concurrently.
    #[must_use]
    pub fn with_slice_workers(mut self, slice_workers: usize) -> Self {
        self.slice_workers = slice_workers.max(1);
        self
    }

    /// Returns the stage plan.
    #[must_use]
    pub fn plan(&self) -> &PipelinePlan {
        &self.plan
    }

    /// Returns the drift volumes hits are routed with.
    #[must_use]
    pub fn volumes(&self) -> &DriftVolumeList {
        &self.volumes
    }

    /// Runs every planned stage over one event.
    ///
    /// All contexts are reset first, so a failure in an earlier event never
    /// leaks into this one. The primary context always stitches last.
    ///
    /// # Errors
    ///
    /// Returns the first `ReconstructionError` raised by a context, tagged
    /// with the event number. The event is abandoned at that point.
    pub async fn process_event(
        &self,
        contexts: &ContextSet,
        event: &Event,
    ) -> Result<EventOutcome, ReconstructionError> {
        self.run(contexts, event)
            .await
            .map_err(|e| e.with_detail("event_number", event.number.to_string()))
    }

    async fn run(&self, contexts: &ContextSet, event: &Event) -> Result<EventOutcome, ReconstructionError> {
        contexts.reset_all()?;
        let mut progress = Progress::default();

        let (routed, unassigned_hits) = self.route_hits(contexts, event);

        let mut remaining = Vec::with_capacity(routed.len());
        for worker_hits in routed {
            remaining.push(self.cosmic_passes(event.number, worker_hits, &mut progress).await?);
        }

        let slices = self.slice(event.number, remaining, &mut progress).await?;
        let mut slices = self
            .reconstruct_slices(contexts, event.number, slices, &mut progress)
            .await?;
        let selected_slice = self
            .identify_neutrino_slice(contexts.primary(), event.number, &slices, &mut progress)
            .await?;
        self.interpret(&mut slices, selected_slice);

        let merged = contexts.primary().stitch().await?;

        debug!(
            event_number = event.number,
            state = %progress.state,
            slices = slices.len(),
            selected_slice = ?selected_slice,
            particles = merged.particle_count,
            "Event reconstructed"
        );

        Ok(EventOutcome {
            event_number: event.number,
            state: progress.state,
            stages_run: progress.stages_run,
            tagged_hits: progress.tagged_hits,
            removed_hits: progress.removed_hits,
            unassigned_hits,
            slices,
            selected_slice,
            merged,
        })
    }

    /// Hands each worker the hits it reconstructs. The primary alone sees
    /// every hit; daughters get the hits of their own volume.
    fn route_hits<'a>(&self, contexts: &'a ContextSet, event: &Event) -> (Vec<WorkerHits<'a>>, usize) {
        let workers = contexts.workers();
        if !contexts.has_daughters() {
            return (
                workers
                    .into_iter()
                    .map(|worker| WorkerHits {
                        worker,
                        hits: event.hits.clone(),
                    })
                    .collect(),
                0,
            );
        }

        let ids: Vec<u32> = workers.iter().filter_map(|w| w.volume_id).collect();
        let mut partition = self.volumes.partition_hits(&event.hits, &ids);
        if !partition.unassigned.is_empty() {
            debug!(
                event_number = event.number,
                unassigned = partition.unassigned.len(),
                "Hits outside every drift volume were dropped"
            );
        }

        let routed = workers
            .into_iter()
            .map(|worker| {
                let hits = partition
                    .per_volume
                    .iter_mut()
                    .find(|(id, _)| Some(*id) == worker.volume_id)
                    .map(|(_, hits)| std::mem::take(hits))
                    .unwrap_or_default();
                WorkerHits { worker, hits }
            })
            .collect();
        (routed, partition.unassigned.len())
    }

    /// All-hits cosmic pass followed by removal of the tagged hits.
    async fn cosmic_passes<'a>(
        &self,
        event_number: u64,
        routed: WorkerHits<'a>,
        progress: &mut Progress,
    ) -> Result<WorkerHits<'a>, ReconstructionError> {
        let WorkerHits { worker, hits } = routed;
        if !self.plan.runs(RecoStage::AllHitsCosmicReco) {
            return Ok(WorkerHits { worker, hits });
        }

        let request = StageRequest::for_hits(event_number, hits);
        let tagged = invoke(worker.context, RecoStage::AllHitsCosmicReco, &request)
            .await?
            .tagged_hits;
        let hits = request.hits;
        progress.record(RecoStage::AllHitsCosmicReco);
        progress.advance(PipelineState::CosmicTagged);
        progress.tagged_hits += hits.iter().filter(|h| tagged.contains(&h.id)).count();

        if !self.plan.runs(RecoStage::CosmicHitRemoval) {
            return Ok(WorkerHits { worker, hits });
        }

        // The context continues with the reduced hit list.
        let (removed, kept): (Vec<Hit>, Vec<Hit>) =
            hits.into_iter().partition(|h| tagged.contains(&h.id));
        let request = StageRequest::for_hits(event_number, kept);
        invoke(worker.context, RecoStage::CosmicHitRemoval, &request).await?;
        progress.record(RecoStage::CosmicHitRemoval);
        progress.removed_hits += removed.len();

        Ok(WorkerHits {
            worker,
            hits: request.hits,
        })
    }

    /// Partitions each worker's hits into slices, numbered across workers
    /// in volume order. Without slicing the whole event is one slice.
    async fn slice(
        &self,
        event_number: u64,
        remaining: Vec<WorkerHits<'_>>,
        progress: &mut Progress,
    ) -> Result<Vec<Slice>, ReconstructionError> {
        progress.advance(PipelineState::Sliced);

        if !self.plan.runs(RecoStage::Slicing) {
            let hits = remaining.into_iter().flat_map(|w| w.hits).collect();
            return Ok(vec![Slice::new(0, None, hits)]);
        }

        let mut slices = Vec::new();
        for WorkerHits { worker, hits } in remaining {
            let request = StageRequest::for_hits(event_number, hits);
            let result = invoke(worker.context, RecoStage::Slicing, &request).await?;

            let by_id: HashMap<HitId, &Hit> = request.hits.iter().map(|h| (h.id, h)).collect();
            for ids in result.slices {
                let mut slice_hits = Vec::with_capacity(ids.len());
                for id in ids {
                    let hit = by_id.get(&id).ok_or_else(|| {
                        ReconstructionError::in_stage(
                            worker.context.name(),
                            RecoStage::Slicing,
                            format!("slice refers to unknown hit {id}"),
                        )
                    })?;
                    slice_hits.push(**hit);
                }
                if !slice_hits.is_empty() {
                    slices.push(Slice::new(slices.len(), worker.volume_id, slice_hits));
                }
            }
        }
        progress.record(RecoStage::Slicing);
        Ok(slices)
    }

    /// Runs the per-slice hypotheses. Slices are independent, so up to
    /// `slice_workers` of them are in flight at once; results come back in
    /// slice order regardless of completion order.
    async fn reconstruct_slices(
        &self,
        contexts: &ContextSet,
        event_number: u64,
        slices: Vec<Slice>,
        progress: &mut Progress,
    ) -> Result<Vec<SliceOutcome>, ReconstructionError> {
        let stages = self.plan.per_slice_stages();
        if stages.is_empty() || slices.is_empty() {
            return Ok(slices.iter().map(empty_outcome).collect());
        }

        let outcomes: Vec<SliceOutcome> = stream::iter(slices)
            .map(|slice| reconstruct_slice(contexts, event_number, slice, &stages))
            .buffered(self.slice_workers)
            .try_collect()
            .await?;

        for stage in stages {
            progress.record(stage);
        }
        progress.advance(PipelineState::Reconstructed);
        Ok(outcomes)
    }

    /// Asks the primary to pick the most neutrino-like slice among those
    /// with a neutrino result. Runs even with no candidates, in which case
    /// nothing can be selected.
    async fn identify_neutrino_slice(
        &self,
        primary: &Arc<dyn ReconstructionContext>,
        event_number: u64,
        slices: &[SliceOutcome],
        progress: &mut Progress,
    ) -> Result<Option<usize>, ReconstructionError> {
        if !self.plan.runs(RecoStage::SliceIdentification) {
            return Ok(None);
        }

        let candidates: Vec<SliceCandidate> = slices
            .iter()
            .filter_map(|slice| {
                slice.neutrino.as_ref().map(|neutrino| SliceCandidate {
                    slice_index: slice.index,
                    hit_count: slice.hit_count,
                    neutrino: neutrino.clone(),
                    cosmic: slice.cosmic.clone(),
                })
            })
            .collect();
        let known: BTreeSet<usize> = candidates.iter().map(|c| c.slice_index).collect();

        let request = StageRequest::for_selection(event_number, candidates);
        let selected = invoke(primary, RecoStage::SliceIdentification, &request)
            .await?
            .selected_slice;

        if let Some(index) = selected {
            if !known.contains(&index) {
                return Err(ReconstructionError::in_stage(
                    primary.name(),
                    RecoStage::SliceIdentification,
                    format!("selected slice {index} is not a candidate"),
                ));
            }
        }

        progress.record(RecoStage::SliceIdentification);
        progress.advance(PipelineState::Resolved);
        Ok(selected)
    }

    /// Gives each slice its final interpretation.
    ///
    /// After slice identification the chosen slice is the neutrino and every
    /// other slice keeps its cosmic result. Without identification a slice
    /// takes the single hypothesis it was reconstructed under, if only one
    /// ran.
    fn interpret(&self, slices: &mut [SliceOutcome], selected: Option<usize>) {
        let identified = self.plan.runs(RecoStage::SliceIdentification);
        for slice in slices {
            slice.interpretation = if identified {
                if Some(slice.index) == selected {
                    Some(Hypothesis::Neutrino)
                } else {
                    slice.cosmic.as_ref().map(|_| Hypothesis::Cosmic)
                }
            } else {
                match (&slice.neutrino, &slice.cosmic) {
                    (Some(_), None) => Some(Hypothesis::Neutrino),
                    (None, Some(_)) => Some(Hypothesis::Cosmic),
                    _ => None,
                }
            };
        }
    }
}

async fn reconstruct_slice(
    contexts: &ContextSet,
    event_number: u64,
    slice: Slice,
    stages: &[RecoStage],
) -> Result<SliceOutcome, ReconstructionError> {
    let context = contexts.worker_for(slice.volume_id);
    let request = StageRequest::for_slice(event_number, &slice);
    let mut outcome = empty_outcome(&slice);

    for &stage in stages {
        let result = invoke(context, stage, &request).await?;
        match stage.hypothesis() {
            Some(Hypothesis::Neutrino) => outcome.neutrino = Some(result),
            Some(Hypothesis::Cosmic) => outcome.cosmic = Some(result),
            None => {}
        }
    }
    Ok(outcome)
}

fn empty_outcome(slice: &Slice) -> SliceOutcome {
    SliceOutcome {
        index: slice.index,
        volume_id: slice.volume_id,
        hit_count: slice.hit_count(),
        neutrino: None,
        cosmic: None,
        interpretation: None,
    }
}

/// Runs one stage on a context, attributing failures to the stage.
async fn invoke(
    context: &Arc<dyn ReconstructionContext>,
    stage: RecoStage,
    request: &StageRequest,
) -> Result<StageResult, ReconstructionError> {
    trace!(
        context = context.name(),
        stage = %stage,
        event_number = request.event_number,
        hits = request.hits.len(),
        "Running stage"
    );
    context.run_stage(stage, request).await.map_err(|e| {
        if e.stage.is_none() {
            e.with_stage(stage)
        } else {
            e
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageToggles;
    use crate::context::DaughterContext;
    use crate::geometry::DriftVolume;
    use crate::testing::MockContext;
    use pretty_assertions::assert_eq;

    fn single_volume() -> DriftVolumeList {
        DriftVolumeList::new(vec![DriftVolume::new(0, [50.0, 0.0, 50.0], [100.0, 200.0, 100.0])])
            .unwrap()
    }

    fn stager(toggles: &StageToggles) -> PipelineStager {
        PipelineStager::new(PipelinePlan::from_toggles(toggles).unwrap(), single_volume())
    }

    fn event(number: u64, hit_count: u64) -> Event {
        Event::new(
            number,
            (0..hit_count)
                .map(|i| Hit::at(i, i as f64, 0.0, 10.0))
                .collect(),
        )
    }

    fn primary_only() -> (Arc<MockContext>, ContextSet) {
        let primary = Arc::new(MockContext::new("primary"));
        let set = ContextSet::new(primary.clone());
        (primary, set)
    }

    #[tokio::test]
    async fn test_tagged_hits_are_removed_before_slicing() {
        let (primary, contexts) = primary_only();
        primary.tag_cosmic_hits([0, 2]);

        let outcome = stager(&StageToggles::default())
            .process_event(&contexts, &event(1, 5))
            .await
            .unwrap();

        assert_eq!(outcome.tagged_hits, 2);
        assert_eq!(outcome.removed_hits, 2);
        let sliced = primary.calls_for(RecoStage::Slicing);
        assert_eq!(sliced[0].hit_ids, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_tags_kept_when_removal_disabled() {
        let (primary, contexts) = primary_only();
        primary.tag_cosmic_hits([0]);
        let toggles = StageToggles {
            should_run_cosmic_hit_removal: false,
            ..StageToggles::default()
        };

        let outcome = stager(&toggles).process_event(&contexts, &event(1, 3)).await.unwrap();

        assert_eq!(outcome.tagged_hits, 1);
        assert_eq!(outcome.removed_hits, 0);
        assert_eq!(primary.calls_for(RecoStage::Slicing)[0].hit_ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_selection_marks_one_neutrino_and_the_rest_cosmic() {
        let (primary, contexts) = primary_only();
        primary.set_slice_size(2);
        primary.set_neutrino_score(1, 0.9);
        primary.set_neutrino_score(0, 0.2);

        let outcome = stager(&StageToggles::default())
            .process_event(&contexts, &event(4, 6))
            .await
            .unwrap();

        assert_eq!(outcome.state, PipelineState::Resolved);
        assert_eq!(outcome.slices.len(), 3);
        assert_eq!(outcome.selected_slice, Some(1));
        assert_eq!(outcome.count_interpreted_as(Hypothesis::Neutrino), 1);
        assert_eq!(outcome.count_interpreted_as(Hypothesis::Cosmic), 2);
        assert_eq!(primary.calls_for(RecoStage::SliceIdentification)[0].candidate_count, 3);
    }

    #[tokio::test]
    async fn test_slice_results_stay_in_slice_order_with_concurrency() {
        let (primary, contexts) = primary_only();
        primary.set_slice_size(1);

        let outcome = stager(&StageToggles::default())
            .with_slice_workers(4)
            .process_event(&contexts, &event(2, 8))
            .await
            .unwrap();

        let indices: Vec<_> = outcome.slices.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_removal_without_tagging_does_nothing() {
        let (primary, contexts) = primary_only();
        let toggles = StageToggles {
            should_run_all_hits_cosmic_reco: false,
            ..StageToggles::default()
        };

        let outcome = stager(&toggles).process_event(&contexts, &event(1, 4)).await.unwrap();

        assert!(!outcome.ran(RecoStage::CosmicHitRemoval));
        assert_eq!(outcome.removed_hits, 0);
        assert!(primary.calls_for(RecoStage::CosmicHitRemoval).is_empty());
        assert_eq!(primary.calls_for(RecoStage::Slicing)[0].hit_ids.len(), 4);
    }

    #[tokio::test]
    async fn test_stage_failure_carries_event_number() {
        let (primary, contexts) = primary_only();
        primary.fail_on(RecoStage::NeutrinoReco, None);

        let err = stager(&StageToggles::default())
            .process_event(&contexts, &event(11, 2))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Some(RecoStage::NeutrinoReco));
        assert_eq!(err.details.get("event_number").map(String::as_str), Some("11"));
        assert_eq!(primary.stitch_count(), 0);
    }

    #[tokio::test]
    async fn test_contexts_reset_before_each_event() {
        let (primary, contexts) = primary_only();
        let stager = stager(&StageToggles::default());

        stager.process_event(&contexts, &event(1, 2)).await.unwrap();
        stager.process_event(&contexts, &event(2, 2)).await.unwrap();

        assert_eq!(primary.reset_count(), 2);
        assert_eq!(primary.stitch_count(), 2);
    }

    #[tokio::test]
    async fn test_daughters_receive_their_own_hits() {
        let volumes = DriftVolumeList::new(vec![
            DriftVolume::new(0, [50.0, 0.0, 50.0], [100.0, 200.0, 100.0]),
            DriftVolume::new(1, [160.0, 0.0, 50.0], [100.0, 200.0, 100.0]),
        ])
        .unwrap();
        let primary = Arc::new(MockContext::new("primary"));
        let mut contexts = ContextSet::new(primary.clone());
        let mut daughters = Vec::new();
        for volume in volumes.iter() {
            let daughter = Arc::new(MockContext::new(format!("volume_{}", volume.volume_id)));
            primary.register_daughter(daughter.clone(), volume).unwrap();
            contexts.push_daughter(DaughterContext {
                volume: volume.clone(),
                context: daughter.clone(),
            });
            daughters.push(daughter);
        }

        let hits = vec![
            Hit::at(1, 10.0, 0.0, 10.0),
            Hit::at(2, 150.0, 0.0, 10.0),
            Hit::at(3, 20.0, 0.0, 10.0),
            Hit::at(4, 10.0, 500.0, 10.0),
        ];
        let stager = PipelineStager::new(
            PipelinePlan::from_toggles(&StageToggles::default()).unwrap(),
            volumes,
        );
        let outcome = stager
            .process_event(&contexts, &Event::new(5, hits))
            .await
            .unwrap();

        assert_eq!(daughters[0].calls_for(RecoStage::Slicing)[0].hit_ids, vec![1, 3]);
        assert_eq!(daughters[1].calls_for(RecoStage::Slicing)[0].hit_ids, vec![2]);
        assert_eq!(outcome.unassigned_hits, 1);
        assert_eq!(outcome.slices[0].volume_id, Some(0));
        assert_eq!(outcome.slices[1].volume_id, Some(1));
        assert_eq!(outcome.merged.contributing_volumes, vec![0, 1]);
        assert!(primary.calls_for(RecoStage::Slicing).is_empty());
        assert_eq!(primary.calls_for(RecoStage::SliceIdentification).len(), 1);
    }

    #[tokio::test]
    async fn test_event_without_slices_skips_hypotheses() {
        let (primary, contexts) = primary_only();

        let outcome = stager(&StageToggles::default())
            .process_event(&contexts, &Event::new(0, vec![]))
            .await
            .unwrap();

        assert!(outcome.slices.is_empty());
        assert!(outcome.ran(RecoStage::Slicing));
        assert!(!outcome.ran(RecoStage::NeutrinoReco));
        assert!(!outcome.ran(RecoStage::CosmicReco));
        assert!(primary.calls_for(RecoStage::NeutrinoReco).is_empty());

        assert!(outcome.ran(RecoStage::SliceIdentification));
        assert_eq!(primary.calls_for(RecoStage::SliceIdentification)[0].candidate_count, 0);
        assert_eq!(outcome.selected_slice, None);
        assert_eq!(outcome.state, PipelineState::Resolved);
    }
}
