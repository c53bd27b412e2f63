//! Geometry and event fixtures.

use crate::core::{Event, Hit, HitId};
use crate::geometry::{DriftVolume, DriftVolumeList};

/// Width of every fixture volume along x (cm).
pub const VOLUME_WIDTH_X: f64 = 100.0;

/// Dead space between neighbouring fixture volumes (cm).
pub const VOLUME_GAP_X: f64 = 10.0;

/// `count` volumes laid out along x, each 100 cm wide and separated by
/// 10 cm of dead space, covering y in [-100, 100] and z in [0, 100].
///
/// # Panics
///
/// Panics if `count` is zero.
#[must_use]
pub fn volume_row(count: u32) -> DriftVolumeList {
    assert!(count > 0, "a detector needs at least one drift volume");
    let volumes = (0..count)
        .map(|id| {
            let x = f64::from(id).mul_add(VOLUME_WIDTH_X + VOLUME_GAP_X, VOLUME_WIDTH_X / 2.0);
            let mut volume = DriftVolume::new(id, [x, 0.0, 50.0], [VOLUME_WIDTH_X, 200.0, 100.0]);
            volume.is_positive_drift = id % 2 == 0;
            volume
        })
        .collect();
    match DriftVolumeList::new(volumes) {
        Ok(list) => list,
        Err(e) => panic!("fixture volumes are valid: {e}"),
    }
}

/// `per_volume` hits inside each volume of the list, spread along x.
/// Identifiers are consecutive from `first_id` in volume order.
#[must_use]
pub fn hits_across(volumes: &DriftVolumeList, per_volume: usize, first_id: HitId) -> Vec<Hit> {
    let mut next_id = first_id;
    let mut hits = Vec::with_capacity(volumes.len() * per_volume);
    for volume in volumes {
        let step = (volume.x_max() - volume.x_min()) / (per_volume as f64 + 1.0);
        for i in 0..per_volume {
            let x = step.mul_add(i as f64 + 1.0, volume.x_min());
            let mut hit = Hit::at(next_id, x, 0.0, 50.0);
            hit.charge = 1.0;
            hits.push(hit);
            next_id += 1;
        }
    }
    hits
}

/// `count` events numbered from zero, each with `per_volume` hits in every
/// volume.
#[must_use]
pub fn event_stream(volumes: &DriftVolumeList, count: u64, per_volume: usize) -> Vec<Event> {
    (0..count)
        .map(|number| Event::new(number, hits_across(volumes, per_volume, 0)))
        .collect()
}

#[cfg(test)]
pub use files::TestFiles;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_row_leaves_gaps() {
        let volumes = volume_row(3);
        let ids: Vec<_> = volumes.iter().map(|v| v.volume_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let first = volumes.get(0).unwrap();
        let second = volumes.get(1).unwrap();
        assert!((second.x_min() - first.x_max() - VOLUME_GAP_X).abs() < 1e-9);
    }

    #[test]
    fn test_hits_land_in_their_volume() {
        let volumes = volume_row(2);
        let hits = hits_across(&volumes, 3, 10);
        assert_eq!(hits.len(), 6);
        assert_eq!(hits[0].id, 10);
        for (i, hit) in hits.iter().enumerate() {
            let expected = u32::try_from(i / 3).unwrap();
            assert_eq!(volumes.volume_for_point(hit.position()).unwrap().volume_id, expected);
        }
    }

    #[test]
    fn test_files_produce_loadable_parameters() {
        let files = TestFiles::new();
        let volumes = volume_row(2);
        let params = files.parameters(&volumes, &event_stream(&volumes, 2, 1));

        assert!(params.pandora_settings_file.is_file());
        assert!(params.event_file_name.is_file());
        let loaded = crate::geometry::load_drift_volumes(&params).unwrap();
        assert_eq!(loaded.len(), volumes.len());
        for (read, written) in loaded.iter().zip(&volumes) {
            assert_eq!(read.volume_id, written.volume_id);
            assert_eq!(read.is_positive_drift, written.is_positive_drift);
            assert!((read.x_min() - written.x_min()).abs() < 1e-9);
            assert!((read.x_max() - written.x_max()).abs() < 1e-9);
            assert!((read.wire_angle_u - written.wire_angle_u).abs() < 1e-12);
        }
    }
}
