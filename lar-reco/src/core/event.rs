//! Input event data: hits and the slices derived from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of a hit, unique within one event.
pub type HitId = u64;

/// A single detector hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Hit identifier.
    pub id: HitId,
    /// Position along the drift axis (cm).
    pub x: f64,
    /// Vertical position (cm).
    #[serde(default)]
    pub y: f64,
    /// Position along the beam axis (cm).
    #[serde(default)]
    pub z: f64,
    /// Hit time (ticks).
    #[serde(default)]
    pub time: f64,
    /// Integrated charge.
    #[serde(default)]
    pub charge: f64,
}

impl Hit {
    /// Creates a hit at a position with zero time and charge.
    #[must_use]
    pub fn at(id: HitId, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            time: 0.0,
            charge: 0.0,
        }
    }

    /// Returns the position as an `[x, y, z]` triple.
    #[must_use]
    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// One trigger's worth of hits.
///
/// Events are never mutated by the pipeline; every stage derives new
/// collections from the hit list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event number as recorded in the input.
    pub number: u64,
    /// The detector hits.
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(number: u64, hits: Vec<Hit>) -> Self {
        Self { number, hits }
    }

    /// Returns the number of hits.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }
}

/// A coherent subset of hits treated as one candidate interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    /// Index of the slice within the event, in volume then context order.
    pub index: usize,
    /// Drift volume the slice was found in, `None` when the primary context
    /// handled the whole detector.
    pub volume_id: Option<u32>,
    /// Hits in the slice.
    pub hits: Vec<Hit>,
}

impl Slice {
    /// Creates a slice.
    #[must_use]
    pub fn new(index: usize, volume_id: Option<u32>, hits: Vec<Hit>) -> Self {
        Self {
            index,
            volume_id,
            hits,
        }
    }

    /// Returns the ids of the hits in the slice.
    #[must_use]
    pub fn hit_ids(&self) -> BTreeSet<HitId> {
        self.hits.iter().map(|h| h.id).collect()
    }

    /// Returns the number of hits.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }
}
