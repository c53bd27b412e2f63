//! Drift volume model and the rules mapping space onto volumes.

use crate::core::Hit;
use crate::errors::GeometryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::FRAC_PI_3;
use std::path::PathBuf;

fn default_wire_pitch() -> f64 {
    0.3
}

fn default_wire_angle_u() -> f64 {
    FRAC_PI_3
}

fn default_wire_angle_v() -> f64 {
    -FRAC_PI_3
}

fn default_sigma_uvw() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// One independently reconstructed region of the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftVolume {
    /// Volume identifier, unique within a description.
    pub volume_id: u32,
    /// Whether electrons drift towards positive x.
    #[serde(default = "default_true")]
    pub is_positive_drift: bool,
    /// U plane wire pitch (cm).
    #[serde(default = "default_wire_pitch")]
    pub wire_pitch_u: f64,
    /// V plane wire pitch (cm).
    #[serde(default = "default_wire_pitch")]
    pub wire_pitch_v: f64,
    /// W plane wire pitch (cm).
    #[serde(default = "default_wire_pitch")]
    pub wire_pitch_w: f64,
    /// U plane wire angle to the vertical (radians).
    #[serde(default = "default_wire_angle_u")]
    pub wire_angle_u: f64,
    /// V plane wire angle to the vertical (radians).
    #[serde(default = "default_wire_angle_v")]
    pub wire_angle_v: f64,
    /// W plane wire angle to the vertical (radians).
    #[serde(default)]
    pub wire_angle_w: f64,
    /// Hit position resolution across all planes.
    #[serde(default = "default_sigma_uvw")]
    pub sigma_uvw: f64,
    /// Volume centre `[x, y, z]` (cm).
    pub center: [f64; 3],
    /// Full widths `[x, y, z]` (cm).
    pub width: [f64; 3],
    /// Whether the volume gets its own reconstruction context.
    #[serde(default = "default_true")]
    pub needs_context: bool,
    /// Settings file for this volume's context, overriding the global one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_file: Option<PathBuf>,
}

impl DriftVolume {
    /// Creates a volume with default wire geometry.
    #[must_use]
    pub fn new(volume_id: u32, center: [f64; 3], width: [f64; 3]) -> Self {
        Self {
            volume_id,
            is_positive_drift: true,
            wire_pitch_u: default_wire_pitch(),
            wire_pitch_v: default_wire_pitch(),
            wire_pitch_w: default_wire_pitch(),
            wire_angle_u: default_wire_angle_u(),
            wire_angle_v: default_wire_angle_v(),
            wire_angle_w: 0.0,
            sigma_uvw: default_sigma_uvw(),
            center,
            width,
            needs_context: true,
            settings_file: None,
        }
    }

    /// Marks the volume as not needing its own context.
    #[must_use]
    pub fn without_context(mut self) -> Self {
        self.needs_context = false;
        self
    }

    /// Lower edge along an axis.
    #[must_use]
    pub fn min(&self, axis: usize) -> f64 {
        self.center[axis] - 0.5 * self.width[axis]
    }

    /// Upper edge along an axis.
    #[must_use]
    pub fn max(&self, axis: usize) -> f64 {
        self.center[axis] + 0.5 * self.width[axis]
    }

    /// Lower edge along the drift axis.
    #[must_use]
    pub fn x_min(&self) -> f64 {
        self.min(0)
    }

    /// Upper edge along the drift axis.
    #[must_use]
    pub fn x_max(&self) -> f64 {
        self.max(0)
    }

    /// Returns true if the point lies inside the volume, edges included.
    #[must_use]
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min(axis) && point[axis] <= self.max(axis))
    }

    /// Returns true if the point lies within the volume's y and z extent.
    #[must_use]
    pub fn covers_transverse(&self, point: [f64; 3]) -> bool {
        (1..3).all(|axis| point[axis] >= self.min(axis) && point[axis] <= self.max(axis))
    }

    /// Distance along x from the volume, zero inside its x extent.
    #[must_use]
    pub fn distance_in_x(&self, x: f64) -> f64 {
        if x < self.x_min() {
            self.x_min() - x
        } else if x > self.x_max() {
            x - self.x_max()
        } else {
            0.0
        }
    }

    fn validate(&self) -> Result<(), GeometryError> {
        for (axis, name) in ["x", "y", "z"].into_iter().enumerate() {
            if !(self.width[axis] > 0.0) {
                return Err(GeometryError::DegenerateVolume {
                    volume_id: self.volume_id,
                    axis: name,
                });
            }
        }
        Ok(())
    }
}

/// A dead region along x between two drift volumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorGap {
    /// Low x edge (cm).
    pub x_low: f64,
    /// High x edge (cm).
    pub x_high: f64,
}

/// Hits split by the drift volume they belong to.
#[derive(Debug, Clone, Default)]
pub struct HitPartition {
    /// Hits per requested volume, in the order the volumes were requested.
    pub per_volume: Vec<(u32, Vec<Hit>)>,
    /// Hits outside every requested volume.
    pub unassigned: Vec<Hit>,
}

/// Ordered, identifier-unique set of drift volumes.
///
/// The order is the order of definition and fixes daughter numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftVolumeList {
    volumes: Vec<DriftVolume>,
    gaps: Vec<DetectorGap>,
}

impl DriftVolumeList {
    /// Creates a list, checking identifiers and extents.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate identifiers or degenerate volumes.
    pub fn new(volumes: Vec<DriftVolume>) -> Result<Self, GeometryError> {
        let mut seen = HashSet::new();
        for volume in &volumes {
            volume.validate()?;
            if !seen.insert(volume.volume_id) {
                return Err(GeometryError::DuplicateVolume {
                    volume_id: volume.volume_id,
                });
            }
        }
        Ok(Self {
            volumes,
            gaps: Vec::new(),
        })
    }

    /// Attaches detector gaps, each of which must separate two volumes.
    ///
    /// # Errors
    ///
    /// Returns an error if a gap is inverted or not bordered on both sides.
    pub fn with_gaps(mut self, gaps: Vec<DetectorGap>) -> Result<Self, GeometryError> {
        for gap in &gaps {
            if gap.x_high < gap.x_low || self.volumes_for_gap(gap).len() < 2 {
                return Err(GeometryError::UnboundedGap {
                    x_low: gap.x_low,
                    x_high: gap.x_high,
                });
            }
        }
        self.gaps = gaps;
        Ok(self)
    }

    /// Returns the number of volumes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Returns true if there are no volumes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Iterates volumes in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &DriftVolume> {
        self.volumes.iter()
    }

    /// Returns the volumes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[DriftVolume] {
        &self.volumes
    }

    /// Returns the detector gaps.
    #[must_use]
    pub fn gaps(&self) -> &[DetectorGap] {
        &self.gaps
    }

    /// Looks up a volume by identifier.
    #[must_use]
    pub fn get(&self, volume_id: u32) -> Option<&DriftVolume> {
        self.volumes.iter().find(|v| v.volume_id == volume_id)
    }

    /// Volumes that get their own context, in definition order.
    pub fn volumes_needing_context(&self) -> impl Iterator<Item = &DriftVolume> {
        self.volumes.iter().filter(|v| v.needs_context)
    }

    /// Number of volumes that get their own context.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.volumes_needing_context().count()
    }

    /// The volume a point belongs to.
    ///
    /// A containing volume wins, the first one on shared edges. Otherwise the
    /// nearest volume along x whose y/z extent covers the point is used, ties
    /// going to the earlier volume.
    #[must_use]
    pub fn volume_for_point(&self, point: [f64; 3]) -> Option<&DriftVolume> {
        Self::closest(self.volumes.iter(), point)
    }

    /// All volumes a region along x maps to.
    ///
    /// Volumes overlapping or touching `[x_low, x_high]` are returned. A region
    /// lying wholly in dead space maps to its nearest neighbour on each side.
    #[must_use]
    pub fn volumes_for_region(&self, x_low: f64, x_high: f64) -> Vec<&DriftVolume> {
        let overlapping: Vec<_> = self
            .volumes
            .iter()
            .filter(|v| v.x_min() <= x_high && v.x_max() >= x_low)
            .collect();
        if !overlapping.is_empty() {
            return overlapping;
        }

        let below = self
            .volumes
            .iter()
            .filter(|v| v.x_max() < x_low)
            .min_by(|a, b| (x_low - a.x_max()).total_cmp(&(x_low - b.x_max())));
        let above = self
            .volumes
            .iter()
            .filter(|v| v.x_min() > x_high)
            .min_by(|a, b| (a.x_min() - x_high).total_cmp(&(b.x_min() - x_high)));

        below.into_iter().chain(above).collect()
    }

    /// Identifiers of the volumes bordering a gap.
    #[must_use]
    pub fn volumes_for_gap(&self, gap: &DetectorGap) -> Vec<u32> {
        self.volumes_for_region(gap.x_low, gap.x_high)
            .into_iter()
            .map(|v| v.volume_id)
            .collect()
    }

    /// Splits hits across the requested volumes.
    ///
    /// Only the volumes in `volume_ids` are candidates; hits are assigned by
    /// the same rule as [`Self::volume_for_point`].
    #[must_use]
    pub fn partition_hits(&self, hits: &[Hit], volume_ids: &[u32]) -> HitPartition {
        let candidates: Vec<&DriftVolume> = volume_ids.iter().filter_map(|id| self.get(*id)).collect();
        let mut per_volume: Vec<(u32, Vec<Hit>)> =
            candidates.iter().map(|v| (v.volume_id, Vec::new())).collect();
        let mut unassigned = Vec::new();

        for hit in hits {
            match Self::closest(candidates.iter().copied(), hit.position()) {
                Some(volume) => {
                    if let Some((_, bucket)) =
                        per_volume.iter_mut().find(|(id, _)| *id == volume.volume_id)
                    {
                        bucket.push(*hit);
                    }
                }
                None => unassigned.push(*hit),
            }
        }

        HitPartition {
            per_volume,
            unassigned,
        }
    }

    fn closest<'a>(
        volumes: impl Iterator<Item = &'a DriftVolume>,
        point: [f64; 3],
    ) -> Option<&'a DriftVolume> {
        let mut best: Option<(&DriftVolume, f64)> = None;
        for volume in volumes {
            if !volume.covers_transverse(point) {
                continue;
            }
            let distance = volume.distance_in_x(point[0]);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((volume, distance));
            }
        }
        best.map(|(volume, _)| volume)
    }
}

impl<'a> IntoIterator for &'a DriftVolumeList {
    type Item = &'a DriftVolume;
    type IntoIter = std::slice::Iter<'a, DriftVolume>;

    fn into_iter(self) -> Self::IntoIter {
        self.volumes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two 100 cm volumes along x with a 10 cm gap between them.
    fn two_volumes() -> DriftVolumeList {
        DriftVolumeList::new(vec![
            DriftVolume::new(0, [50.0, 0.0, 50.0], [100.0, 200.0, 100.0]),
            DriftVolume::new(1, [160.0, 0.0, 50.0], [100.0, 200.0, 100.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = DriftVolumeList::new(vec![
            DriftVolume::new(3, [0.0; 3], [1.0; 3]),
            DriftVolume::new(3, [5.0, 0.0, 0.0], [1.0; 3]),
        ])
        .unwrap_err();
        assert_eq!(err, GeometryError::DuplicateVolume { volume_id: 3 });
    }

    #[test]
    fn test_degenerate_volume_rejected() {
        let err = DriftVolumeList::new(vec![DriftVolume::new(0, [0.0; 3], [1.0, 0.0, 1.0])])
            .unwrap_err();
        assert_eq!(
            err,
            GeometryError::DegenerateVolume { volume_id: 0, axis: "y" }
        );
    }

    #[test]
    fn test_point_inside_volume() {
        let volumes = two_volumes();
        let volume = volumes.volume_for_point([120.0, 10.0, 20.0]).unwrap();
        assert_eq!(volume.volume_id, 1);
    }

    #[test]
    fn test_point_in_gap_goes_to_nearest_volume() {
        let volumes = two_volumes();
        assert_eq!(volumes.volume_for_point([102.0, 0.0, 0.0]).unwrap().volume_id, 0);
        assert_eq!(volumes.volume_for_point([108.0, 0.0, 0.0]).unwrap().volume_id, 1);
        // Equidistant: earlier volume wins.
        assert_eq!(volumes.volume_for_point([105.0, 0.0, 0.0]).unwrap().volume_id, 0);
    }

    #[test]
    fn test_point_outside_transverse_extent() {
        let volumes = two_volumes();
        assert!(volumes.volume_for_point([50.0, 500.0, 0.0]).is_none());
    }

    #[test]
    fn test_gap_maps_to_both_neighbours() {
        let volumes = two_volumes();
        let gap = DetectorGap { x_low: 101.0, x_high: 109.0 };
        assert_eq!(volumes.volumes_for_gap(&gap), vec![0, 1]);
    }

    #[test]
    fn test_region_inside_one_volume() {
        let volumes = two_volumes();
        let ids: Vec<_> = volumes
            .volumes_for_region(20.0, 30.0)
            .into_iter()
            .map(|v| v.volume_id)
            .collect();
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn test_with_gaps_rejects_unbounded_gap() {
        let err = two_volumes()
            .with_gaps(vec![DetectorGap { x_low: 300.0, x_high: 310.0 }])
            .unwrap_err();
        assert!(matches!(err, GeometryError::UnboundedGap { .. }));
    }

    #[test]
    fn test_with_gaps_accepts_separating_gap() {
        let volumes = two_volumes()
            .with_gaps(vec![DetectorGap { x_low: 100.0, x_high: 110.0 }])
            .unwrap();
        assert_eq!(volumes.gaps().len(), 1);
    }

    #[test]
    fn test_partition_hits_respects_requested_volumes() {
        let volumes = two_volumes();
        let hits = vec![
            Hit::at(1, 10.0, 0.0, 0.0),
            Hit::at(2, 150.0, 0.0, 0.0),
            Hit::at(3, 104.0, 0.0, 0.0),
            Hit::at(4, 10.0, 999.0, 0.0),
        ];

        let partition = volumes.partition_hits(&hits, &[0, 1]);
        let ids = |bucket: &Vec<Hit>| bucket.iter().map(|h| h.id).collect::<Vec<_>>();
        assert_eq!(partition.per_volume[0].0, 0);
        assert_eq!(ids(&partition.per_volume[0].1), vec![1, 3]);
        assert_eq!(ids(&partition.per_volume[1].1), vec![2]);
        assert_eq!(ids(&partition.unassigned), vec![4]);

        let only_second = volumes.partition_hits(&hits, &[1]);
        assert_eq!(ids(&only_second.per_volume[0].1), vec![1, 2, 3]);
    }

    #[test]
    fn test_context_count_skips_flagged_volumes() {
        let volumes = DriftVolumeList::new(vec![
            DriftVolume::new(0, [0.0; 3], [1.0; 3]),
            DriftVolume::new(1, [5.0, 0.0, 0.0], [1.0; 3]).without_context(),
        ])
        .unwrap();
        assert_eq!(volumes.context_count(), 1);
    }
}
