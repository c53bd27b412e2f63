//! Command line entry point.
//!
//! Usage: `lar-reco <parameters.json>`
//!
//! Exits non-zero only when the run cannot start: missing or malformed
//! parameters, geometry or settings. Events that fail to reconstruct are
//! reported and skipped.

use anyhow::{bail, Context, Result};
use lar_reco::prelude::*;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let format = std::env::var("LAR_RECO_LOG_FORMAT")
        .map(|name| LogFormat::from_name(&name))
        .unwrap_or_default();
    init_tracing(format);

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: lar-reco <parameters.json>");
    };

    let params = Parameters::from_file(&path)
        .with_context(|| format!("loading parameters from {path}"))?;
    let volumes = load_drift_volumes(&params).context("loading drift volumes")?;
    let contexts =
        create_instances(&params, &volumes, &PassThroughProvider).context("creating contexts")?;
    let stager = PipelineStager::from_parameters(&params, volumes).context("planning stages")?;
    let mut source = JsonLinesEventSource::open(&params.event_file_name)
        .context("opening event input")?;

    let summary = EventLoop::new(&params, &contexts, &stager)
        .with_sink(Arc::new(LoggingEventSink::debug()))
        .process_events(&mut source)
        .await;

    info!(
        run_id = %summary.run_id,
        processed = summary.processed.len(),
        failed = summary.failures.len(),
        success_rate = summary.success_rate(),
        "Finished"
    );
    Ok(())
}
