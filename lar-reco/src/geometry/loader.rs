//! Reading drift volume and detector gap descriptions from disk.

use super::{DetectorGap, DriftVolume, DriftVolumeList};
use crate::config::Parameters;
use crate::errors::{ConfigurationError, GeometryError};
use serde::{de::DeserializeOwned, Deserialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct DriftVolumeDescription {
    #[serde(default)]
    volumes: Vec<DriftVolume>,
}

#[derive(Debug, Default, Deserialize)]
struct GeometryDescription {
    #[serde(default)]
    detector_name: Option<String>,
    #[serde(default)]
    gaps: Vec<DetectorGap>,
}

/// Loads the drift volumes named by the parameters.
///
/// The drift volume description is mandatory. The geometry file is optional;
/// when given it must exist and its gaps must each separate two volumes.
/// Volume order matches the description.
///
/// # Errors
///
/// Returns a `ConfigurationError` if either file is missing, unreadable or
/// malformed, or if no volumes are defined.
pub fn load_drift_volumes(parameters: &Parameters) -> Result<DriftVolumeList, ConfigurationError> {
    let description_path = parameters.drift_volume_description_file.as_path();
    if description_path.as_os_str().is_empty() {
        return Err(ConfigurationError::missing("drift_volume_description_file"));
    }

    let description: DriftVolumeDescription =
        read_json(description_path, "drift volume description")?;
    if description.volumes.is_empty() {
        return Err(GeometryError::NoVolumes {
            path: description_path.to_path_buf(),
        }
        .into());
    }

    let mut volumes = DriftVolumeList::new(description.volumes)?;

    let geometry_path = parameters.geometry_file_name.as_path();
    if !geometry_path.as_os_str().is_empty() {
        let geometry: GeometryDescription = read_json(geometry_path, "geometry file")?;
        debug!(
            detector = geometry.detector_name.as_deref().unwrap_or("unnamed"),
            gaps = geometry.gaps.len(),
            "Read detector geometry"
        );
        volumes = volumes.with_gaps(geometry.gaps)?;
    }

    info!(
        volumes = volumes.len(),
        contexts = volumes.context_count(),
        gaps = volumes.gaps().len(),
        "Loaded drift volumes"
    );
    Ok(volumes)
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &'static str) -> Result<T, ConfigurationError> {
    if !path.is_file() {
        return Err(ConfigurationError::not_found(what, path));
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| {
        GeometryError::Parse {
            what,
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}
