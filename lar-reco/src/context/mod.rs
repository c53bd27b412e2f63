//! Reconstruction contexts.
//!
//! A reconstruction context is an opaque, independently configured
//! reconstruction engine. The orchestrator only ever talks to it through the
//! [`ReconstructionContext`] trait; everything inside is a black box.
//!
//! One primary context exists per process. When more than one drift volume
//! needs its own context, one daughter per volume is created and registered
//! with the primary, which merges their output.

mod factory;
mod passthrough;
mod set;

pub use factory::{
    create_daughter_instances, create_instances, create_primary_instance,
    daughter_context_name, PRIMARY_CONTEXT_NAME,
};
pub use passthrough::{PassThroughContext, PassThroughProvider};
pub use set::{ContextSet, DaughterContext, Worker};

use crate::core::{MergedResult, RecoStage, StageRequest, StageResult};
use crate::errors::ReconstructionError;
use crate::geometry::DriftVolume;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// What a context is being configured as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    /// The primary context, seeing the full detector.
    Primary,
    /// Stitching settings layered on the primary.
    Stitching,
    /// A daughter scoped to one drift volume.
    Daughter,
}

/// Configuration handed to [`ReconstructionContext::configure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// The role being configured.
    pub role: ContextRole,
    /// Settings file for the context.
    pub settings_file: PathBuf,
    /// Geometry visible to the context.
    pub volumes: Vec<DriftVolume>,
}

impl ContextConfig {
    /// Configuration for the primary context.
    #[must_use]
    pub fn primary(settings_file: impl Into<PathBuf>, volumes: Vec<DriftVolume>) -> Self {
        Self {
            role: ContextRole::Primary,
            settings_file: settings_file.into(),
            volumes,
        }
    }

    /// Stitching configuration layered on the primary context.
    #[must_use]
    pub fn stitching(settings_file: impl Into<PathBuf>, volumes: Vec<DriftVolume>) -> Self {
        Self {
            role: ContextRole::Stitching,
            settings_file: settings_file.into(),
            volumes,
        }
    }

    /// Configuration for a daughter context.
    #[must_use]
    pub fn daughter(settings_file: impl Into<PathBuf>, volume: DriftVolume) -> Self {
        Self {
            role: ContextRole::Daughter,
            settings_file: settings_file.into(),
            volumes: vec![volume],
        }
    }
}

/// The capability surface required from a reconstruction engine.
///
/// Implementations hold their own per-event state behind interior
/// mutability; the orchestrator calls [`reset`](Self::reset) before the first
/// stage of every event.
#[async_trait]
pub trait ReconstructionContext: Send + Sync + Debug {
    /// Returns the name of the context.
    fn name(&self) -> &str;

    /// Applies a settings file and geometry. The primary may be configured
    /// more than once; later configurations layer on earlier ones.
    fn configure(&self, config: &ContextConfig) -> Result<(), ReconstructionError>;

    /// Forwards free-form parameters to the context's algorithms.
    fn set_external_parameters(
        &self,
        _parameters: &BTreeMap<String, String>,
    ) -> Result<(), ReconstructionError> {
        Ok(())
    }

    /// Runs one stage over the request.
    async fn run_stage(
        &self,
        stage: RecoStage,
        request: &StageRequest,
    ) -> Result<StageResult, ReconstructionError>;

    /// Clears per-event transient state.
    fn reset(&self) -> Result<(), ReconstructionError>;

    /// Registers a daughter context scoped to a volume. Primary only.
    fn register_daughter(
        &self,
        daughter: Arc<dyn ReconstructionContext>,
        volume: &DriftVolume,
    ) -> Result<(), ReconstructionError>;

    /// Merges the registered daughters' per-event output. A context without
    /// daughters returns its own output for the event.
    async fn stitch(&self) -> Result<MergedResult, ReconstructionError>;
}

/// Source of fresh reconstruction contexts.
pub trait ContextProvider: Send + Sync + Debug {
    /// Creates a new, unconfigured context.
    fn create(&self, name: &str) -> Result<Arc<dyn ReconstructionContext>, ReconstructionError>;
}
