//! Benchmarks for stage planning, hit routing and event staging.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lar_reco::config::StageToggles;
use lar_reco::context::{ContextConfig, ContextSet, PassThroughContext, ReconstructionContext};
use lar_reco::pipeline::{PipelinePlan, PipelineStager};
use lar_reco::testing::{event_stream, hits_across, volume_row};
use std::sync::Arc;

fn planning_benchmark(c: &mut Criterion) {
    let toggles = StageToggles::default();
    c.bench_function("plan_from_toggles", |b| {
        b.iter(|| PipelinePlan::from_toggles(black_box(&toggles)))
    });
}

fn routing_benchmark(c: &mut Criterion) {
    let volumes = volume_row(4);
    let hits = hits_across(&volumes, 2_500, 0);
    let ids: Vec<u32> = volumes.iter().map(|v| v.volume_id).collect();
    c.bench_function("partition_10k_hits_4_volumes", |b| {
        b.iter(|| volumes.partition_hits(black_box(&hits), black_box(&ids)))
    });
}

fn staging_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };
    let volumes = volume_row(1);
    let primary = Arc::new(PassThroughContext::new("primary"));
    if primary
        .configure(&ContextConfig::primary("settings.xml", volumes.as_slice().to_vec()))
        .is_err()
    {
        return;
    }
    let contexts = ContextSet::new(primary);
    let Ok(plan) = PipelinePlan::from_toggles(&StageToggles::default()) else {
        return;
    };
    let stager = PipelineStager::new(plan, volumes.clone());
    let events = event_stream(&volumes, 1, 1_000);

    c.bench_function("stage_event_1k_hits", |b| {
        b.iter(|| runtime.block_on(stager.process_event(&contexts, black_box(&events[0]))))
    });
}

criterion_group!(benches, planning_benchmark, routing_benchmark, staging_benchmark);
criterion_main!(benches);
