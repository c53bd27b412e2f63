//! Application parameters, read once at startup.

use super::RecoOption;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Independent switches for the staged reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    /// Whether to run all hits cosmic-ray reconstruction.
    pub should_run_all_hits_cosmic_reco: bool,
    /// Whether to remove hits from tagged cosmic-rays.
    pub should_run_cosmic_hit_removal: bool,
    /// Whether to slice events into separate regions for processing.
    pub should_run_slicing: bool,
    /// Whether to run neutrino reconstruction for each slice.
    pub should_run_neutrino_reco_option: bool,
    /// Whether to run cosmic-ray reconstruction for each slice.
    pub should_run_cosmic_reco_option: bool,
    /// Whether to identify the most appropriate neutrino slice.
    pub should_identify_neutrino_slice: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            should_run_all_hits_cosmic_reco: true,
            should_run_cosmic_hit_removal: true,
            should_run_slicing: true,
            should_run_neutrino_reco_option: true,
            should_run_cosmic_reco_option: true,
            should_identify_neutrino_slice: true,
        }
    }
}

impl StageToggles {
    /// Every stage disabled.
    #[must_use]
    pub fn none() -> Self {
        Self {
            should_run_all_hits_cosmic_reco: false,
            should_run_cosmic_hit_removal: false,
            should_run_slicing: false,
            should_run_neutrino_reco_option: false,
            should_run_cosmic_reco_option: false,
            should_identify_neutrino_slice: false,
        }
    }

    /// Renders the toggles as string parameters for contexts.
    #[must_use]
    pub fn to_external(&self) -> BTreeMap<String, String> {
        [
            ("ShouldRunAllHitsCosmicReco", self.should_run_all_hits_cosmic_reco),
            ("ShouldRunCosmicHitRemoval", self.should_run_cosmic_hit_removal),
            ("ShouldRunSlicing", self.should_run_slicing),
            ("ShouldRunNeutrinoRecoOption", self.should_run_neutrino_reco_option),
            ("ShouldRunCosmicRecoOption", self.should_run_cosmic_reco_option),
            ("ShouldPerformSliceId", self.should_identify_neutrino_slice),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}

/// The process-wide configuration record.
///
/// Constructed once and passed by reference to every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// The path to the pandora settings file (mandatory).
    pub pandora_settings_file: PathBuf,
    /// File containing the input events.
    pub event_file_name: PathBuf,
    /// The drift volume description file (mandatory).
    pub drift_volume_description_file: PathBuf,
    /// File containing detector gap geometry.
    pub geometry_file_name: PathBuf,
    /// The stitching settings file, required only with multiple drift volumes.
    pub stitching_settings_file: PathBuf,

    /// Number of events to process, negative for all events.
    pub n_events_to_process: i64,
    /// Number of events to skip.
    pub n_events_to_skip: u64,
    /// Whether event numbers should be displayed.
    pub should_display_event_number: bool,

    /// Stage switches.
    #[serde(flatten)]
    pub toggles: StageToggles,
    /// Preset overriding the individual stage switches.
    pub reco_option: Option<RecoOption>,

    /// Whether to print current operation status messages.
    pub print_overall_reco_status: bool,

    /// Maximum number of slices reconstructed concurrently.
    pub slice_workers: usize,
    /// Free-form parameters forwarded to every context.
    pub external_parameters: BTreeMap<String, String>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            pandora_settings_file: PathBuf::new(),
            event_file_name: PathBuf::new(),
            drift_volume_description_file: PathBuf::new(),
            geometry_file_name: PathBuf::new(),
            stitching_settings_file: PathBuf::new(),
            n_events_to_process: -1,
            n_events_to_skip: 0,
            should_display_event_number: false,
            toggles: StageToggles::default(),
            reco_option: None,
            print_overall_reco_status: false,
            slice_workers: 1,
            external_parameters: BTreeMap::new(),
        }
    }
}

impl Parameters {
    /// Creates parameters with the two mandatory paths set.
    #[must_use]
    pub fn new(settings: impl Into<PathBuf>, drift_volume_description: impl Into<PathBuf>) -> Self {
        Self {
            pandora_settings_file: settings.into(),
            drift_volume_description_file: drift_volume_description.into(),
            ..Self::default()
        }
    }

    /// Reads and validates parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::not_found("parameters file", path));
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
            what: "parameters file",
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json_str(&text).map_err(|err| match err {
            ConfigurationError::MalformedParameters { reason, .. } => {
                ConfigurationError::MalformedParameters {
                    path: path.to_path_buf(),
                    reason,
                }
            }
            other => other,
        })
    }

    /// Parses and validates parameters from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is unparsable or fails validation.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        let parsed: Self =
            serde_json::from_str(text).map_err(|e| ConfigurationError::MalformedParameters {
                path: PathBuf::new(),
                reason: e.to_string(),
            })?;

        let parsed = match parsed.reco_option {
            Some(option) => parsed.with_reco_option(option),
            None => parsed,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    /// Applies a steering preset to the stage switches.
    #[must_use]
    pub fn with_reco_option(mut self, option: RecoOption) -> Self {
        self.reco_option = Some(option);
        self.toggles = option.toggles();
        self
    }

    /// Sets the stage switches.
    #[must_use]
    pub fn with_toggles(mut self, toggles: StageToggles) -> Self {
        self.toggles = toggles;
        self
    }

    /// Sets the event bounds.
    #[must_use]
    pub fn with_event_bounds(mut self, skip: u64, process: i64) -> Self {
        self.n_events_to_skip = skip;
        self.n_events_to_process = process;
        self
    }

    /// Sets the stitching settings file.
    #[must_use]
    pub fn with_stitching_settings(mut self, path: impl Into<PathBuf>) -> Self {
        self.stitching_settings_file = path.into();
        self
    }

    /// Sets the detector geometry file.
    #[must_use]
    pub fn with_geometry_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.geometry_file_name = path.into();
        self
    }

    /// Returns the maximum number of events to process, `None` for unbounded.
    #[must_use]
    pub fn event_limit(&self) -> Option<u64> {
        u64::try_from(self.n_events_to_process).ok()
    }

    /// Checks the mandatory parameters.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or invalid parameter.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pandora_settings_file.as_os_str().is_empty() {
            return Err(ConfigurationError::missing("pandora_settings_file"));
        }
        if self.drift_volume_description_file.as_os_str().is_empty() {
            return Err(ConfigurationError::missing("drift_volume_description_file"));
        }
        if self.slice_workers == 0 {
            return Err(ConfigurationError::invalid(
                "slice_workers",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parameters forwarded to every context: the stage switches plus any
    /// user supplied entries, which take precedence.
    #[must_use]
    pub fn context_parameters(&self) -> BTreeMap<String, String> {
        let mut params = self.toggles.to_external();
        params.extend(
            self.external_parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_application() {
        let params = Parameters::default();
        assert_eq!(params.n_events_to_process, -1);
        assert_eq!(params.n_events_to_skip, 0);
        assert!(!params.should_display_event_number);
        assert!(!params.print_overall_reco_status);
        assert_eq!(params.toggles, StageToggles::default());
        assert!(params.toggles.should_run_slicing);
        assert_eq!(params.event_limit(), None);
    }

    #[test]
    fn test_parse_flat_toggles() {
        let params = Parameters::from_json_str(
            r#"{
                "pandora_settings_file": "settings.xml",
                "drift_volume_description_file": "volumes.json",
                "should_run_slicing": false,
                "n_events_to_process": 5
            }"#,
        )
        .unwrap();

        assert!(!params.toggles.should_run_slicing);
        assert!(params.toggles.should_run_neutrino_reco_option);
        assert_eq!(params.event_limit(), Some(5));
    }

    #[test]
    fn test_reco_option_overrides_toggles() {
        let params = Parameters::from_json_str(
            r#"{
                "pandora_settings_file": "settings.xml",
                "drift_volume_description_file": "volumes.json",
                "should_run_slicing": true,
                "reco_option": "AllHitsNu"
            }"#,
        )
        .unwrap();

        assert_eq!(params.toggles, RecoOption::AllHitsNu.toggles());
    }

    #[test]
    fn test_unknown_reco_option_is_malformed() {
        let err = Parameters::from_json_str(
            r#"{
                "pandora_settings_file": "settings.xml",
                "drift_volume_description_file": "volumes.json",
                "reco_option": "everything"
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationError::MalformedParameters { .. }));
        assert!(err.to_string().contains("everything"));
    }

    #[test]
    fn test_missing_settings_file_is_rejected() {
        let err = Parameters::from_json_str(r#"{"drift_volume_description_file": "v.json"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter { name: "pandora_settings_file" }
        ));
    }

    #[test]
    fn test_missing_description_file_is_rejected() {
        let err = Parameters::new("settings.xml", "").validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter { name: "drift_volume_description_file" }
        ));
    }

    #[test]
    fn test_zero_slice_workers_is_rejected() {
        let mut params = Parameters::new("s.xml", "v.json");
        params.slice_workers = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_from_file_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = Parameters::from_file(file.path()).unwrap_err();
        match err {
            ConfigurationError::MalformedParameters { path, .. } => {
                assert_eq!(path, file.path());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_file_missing() {
        let err = Parameters::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigurationError::FileNotFound { .. }));
    }

    #[test]
    fn test_external_parameters_take_precedence() {
        let mut params = Parameters::new("s.xml", "v.json").with_toggles(StageToggles::none());
        params
            .external_parameters
            .insert("ShouldRunSlicing".to_string(), "true".to_string());

        let external = params.context_parameters();
        assert_eq!(external.get("ShouldRunSlicing").map(String::as_str), Some("true"));
        assert_eq!(external.get("ShouldRunCosmicRecoOption").map(String::as_str), Some("false"));
    }
}
