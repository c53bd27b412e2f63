//! The primary context together with its daughters.

use super::ReconstructionContext;
use crate::errors::ReconstructionError;
use crate::geometry::DriftVolume;
use std::sync::Arc;

/// A daughter context and the volume it reconstructs.
#[derive(Debug, Clone)]
pub struct DaughterContext {
    /// The volume the daughter is scoped to.
    pub volume: DriftVolume,
    /// The daughter context.
    pub context: Arc<dyn ReconstructionContext>,
}

/// A context that runs the per-volume stages.
#[derive(Debug, Clone)]
pub struct Worker<'a> {
    /// The context.
    pub context: &'a Arc<dyn ReconstructionContext>,
    /// Volume the worker is scoped to, `None` for the primary, which sees
    /// every hit.
    pub volume_id: Option<u32>,
}

/// All contexts created for the process.
///
/// The primary context is created first and outlives the daughters it
/// aggregates. Daughters are kept in drift volume order.
#[derive(Debug, Clone)]
pub struct ContextSet {
    primary: Arc<dyn ReconstructionContext>,
    daughters: Vec<DaughterContext>,
}

impl ContextSet {
    /// Creates a set holding only a primary context.
    #[must_use]
    pub fn new(primary: Arc<dyn ReconstructionContext>) -> Self {
        Self {
            primary,
            daughters: Vec::new(),
        }
    }

    /// Adds a daughter. Registration with the primary is the caller's job.
    pub fn push_daughter(&mut self, daughter: DaughterContext) {
        self.daughters.push(daughter);
    }

    /// Returns the primary context.
    #[must_use]
    pub fn primary(&self) -> &Arc<dyn ReconstructionContext> {
        &self.primary
    }

    /// Returns the daughters in volume order.
    #[must_use]
    pub fn daughters(&self) -> &[DaughterContext] {
        &self.daughters
    }

    /// Returns true if daughters exist.
    #[must_use]
    pub fn has_daughters(&self) -> bool {
        !self.daughters.is_empty()
    }

    /// The contexts that run the per-volume stages: the daughters, or the
    /// primary alone when it handles the detector directly.
    #[must_use]
    pub fn workers(&self) -> Vec<Worker<'_>> {
        if self.daughters.is_empty() {
            return vec![Worker {
                context: &self.primary,
                volume_id: None,
            }];
        }
        self.daughters
            .iter()
            .map(|d| Worker {
                context: &d.context,
                volume_id: Some(d.volume.volume_id),
            })
            .collect()
    }

    /// Finds the worker context responsible for a volume.
    #[must_use]
    pub fn worker_for(&self, volume_id: Option<u32>) -> &Arc<dyn ReconstructionContext> {
        volume_id
            .and_then(|id| self.daughters.iter().find(|d| d.volume.volume_id == id))
            .map_or(&self.primary, |d| &d.context)
    }

    /// Resets per-event state on the primary and every daughter.
    ///
    /// # Errors
    ///
    /// Returns the first reset failure.
    pub fn reset_all(&self) -> Result<(), ReconstructionError> {
        self.primary.reset()?;
        for daughter in &self.daughters {
            daughter.context.reset()?;
        }
        Ok(())
    }

    /// Total number of contexts, primary included.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.daughters.len()
    }

    /// Always false; a set holds at least the primary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}
