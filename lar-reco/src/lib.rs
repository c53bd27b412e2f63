//! # lar-reco
//!
//! Orchestration of multi-drift-volume event reconstruction for liquid argon
//! time projection chambers.
//!
//! The detector is split into drift volumes, each reconstructed by its own
//! daughter context; a primary context stitches their output together. The
//! crate covers the control layer around those opaque contexts:
//!
//! - **Geometry**: drift volume descriptions and the rules mapping hits and
//!   gaps onto volumes
//! - **Context creation**: one primary context plus one daughter per volume,
//!   wired with global, per-volume and stitching settings
//! - **Staging**: the per-event sequence of all-hits cosmic reconstruction,
//!   cosmic hit removal, slicing, per-slice neutrino and cosmic hypotheses and
//!   neutrino slice identification, each switchable
//! - **Event loop**: skip and process bounds, with per-event failures
//!   contained
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lar_reco::prelude::*;
//!
//! let params = Parameters::from_file("reco.json")?;
//! let volumes = load_drift_volumes(&params)?;
//! let contexts = create_instances(&params, &volumes, &PassThroughProvider)?;
//! let stager = PipelineStager::from_parameters(&params, volumes)?;
//!
//! let mut source = JsonLinesEventSource::open(&params.event_file_name)?;
//! let summary = process_events(&params, &contexts, &stager, &mut source).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod controller;
pub mod core;
pub mod errors;
pub mod events;
pub mod geometry;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Parameters, RecoOption, StageToggles};
    pub use crate::context::{
        create_instances, ContextConfig, ContextProvider, ContextRole, ContextSet,
        PassThroughProvider, ReconstructionContext,
    };
    pub use crate::controller::{
        process_events, EventLoop, EventSource, JsonLinesEventSource, RunSummary,
        VecEventSource,
    };
    pub use crate::core::{
        Event, Hit, HitId, Hypothesis, MergedResult, PipelineState, RecoStage, StageRequest,
        StageResult,
    };
    pub use crate::errors::{
        ConfigurationError, EventSourceError, GeometryError, LarRecoError, ReconstructionError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::geometry::{load_drift_volumes, DriftVolume, DriftVolumeList};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{EventOutcome, PipelinePlan, PipelineStager, SliceOutcome};
}
