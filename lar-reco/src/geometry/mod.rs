//! Detector partitioning into drift volumes.
//!
//! This module provides:
//! - The drift volume model and the point/region/gap mapping rules
//! - Loading of volume and gap descriptions

mod loader;
mod volume;

pub use loader::load_drift_volumes;
pub use volume::{DetectorGap, DriftVolume, DriftVolumeList, HitPartition};
