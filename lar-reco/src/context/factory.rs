//! Creation and wiring of the primary and daughter contexts.

use super::{ContextConfig, ContextProvider, ContextSet, DaughterContext, ReconstructionContext};
use crate::config::Parameters;
use crate::errors::ConfigurationError;
use crate::geometry::DriftVolumeList;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Name given to the primary context.
pub const PRIMARY_CONTEXT_NAME: &str = "primary";

/// Name given to the daughter context of a volume.
#[must_use]
pub fn daughter_context_name(volume_id: u32) -> String {
    format!("volume_{volume_id}")
}

/// Creates the primary context and, where needed, its daughters.
///
/// This is the single entry point for context creation and is called once
/// per process.
///
/// # Errors
///
/// Returns a `ConfigurationError` if a mandatory settings file is missing or
/// a context cannot be created or configured.
pub fn create_instances(
    parameters: &Parameters,
    volumes: &DriftVolumeList,
    provider: &dyn ContextProvider,
) -> Result<ContextSet, ConfigurationError> {
    let primary = create_primary_instance(parameters, volumes, provider)?;
    let mut contexts = ContextSet::new(primary);
    create_daughter_instances(parameters, volumes, &mut contexts, provider)?;

    info!(
        contexts = contexts.len(),
        daughters = contexts.daughters().len(),
        "Created reconstruction contexts"
    );
    Ok(contexts)
}

/// Creates the primary context, configured with the global settings and the
/// full drift volume geometry.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the settings file is missing or
/// unreadable, or if the context cannot be created or configured.
pub fn create_primary_instance(
    parameters: &Parameters,
    volumes: &DriftVolumeList,
    provider: &dyn ContextProvider,
) -> Result<Arc<dyn ReconstructionContext>, ConfigurationError> {
    let settings = parameters.pandora_settings_file.as_path();
    require_file(settings, "pandora_settings_file", "pandora settings file")?;

    let primary = provider.create(PRIMARY_CONTEXT_NAME)?;
    primary.configure(&ContextConfig::primary(settings, volumes.as_slice().to_vec()))?;
    primary.set_external_parameters(&parameters.context_parameters())?;

    debug!(
        context = primary.name(),
        settings = %settings.display(),
        volumes = volumes.len(),
        "Configured primary context"
    );
    Ok(primary)
}

/// Creates one daughter per drift volume that needs its own context and
/// registers each with the primary.
///
/// With at most one such volume no daughters are made and the primary
/// handles the detector itself. Otherwise the stitching settings are
/// mandatory and are layered onto the primary first.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the stitching settings are required but
/// missing, or if a daughter cannot be created, configured or registered.
pub fn create_daughter_instances(
    parameters: &Parameters,
    volumes: &DriftVolumeList,
    contexts: &mut ContextSet,
    provider: &dyn ContextProvider,
) -> Result<(), ConfigurationError> {
    let daughter_count = volumes.context_count();
    if daughter_count <= 1 {
        debug!(
            volumes_needing_context = daughter_count,
            "Primary context handles reconstruction directly"
        );
        return Ok(());
    }

    let stitching = parameters.stitching_settings_file.as_path();
    require_file(stitching, "stitching_settings_file", "stitching settings file")?;

    let primary = contexts.primary().clone();
    primary.configure(&ContextConfig::stitching(stitching, volumes.as_slice().to_vec()))?;

    let external = parameters.context_parameters();
    for volume in volumes.volumes_needing_context() {
        let settings = volume
            .settings_file
            .as_deref()
            .unwrap_or(parameters.pandora_settings_file.as_path());
        if !settings.is_file() {
            return Err(ConfigurationError::not_found("daughter settings file", settings));
        }

        let name = daughter_context_name(volume.volume_id);
        let daughter = provider.create(&name)?;
        daughter.configure(&ContextConfig::daughter(settings, volume.clone()))?;
        daughter.set_external_parameters(&external)?;
        primary.register_daughter(daughter.clone(), volume)?;

        debug!(
            context = %name,
            volume_id = volume.volume_id,
            settings = %settings.display(),
            "Registered daughter context"
        );
        contexts.push_daughter(DaughterContext {
            volume: volume.clone(),
            context: daughter,
        });
    }

    Ok(())
}

fn require_file(path: &Path, name: &'static str, what: &'static str) -> Result<(), ConfigurationError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigurationError::missing(name));
    }
    if !path.is_file() {
        return Err(ConfigurationError::not_found(what, path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextRole;
    use crate::geometry::DriftVolume;
    use crate::testing::MockProvider;
    use tempfile::NamedTempFile;

    fn volumes(count: u32) -> DriftVolumeList {
        DriftVolumeList::new(
            (0..count)
                .map(|i| DriftVolume::new(i, [f64::from(i) * 110.0, 0.0, 0.0], [100.0; 3]))
                .collect(),
        )
        .unwrap()
    }

    fn settings_file() -> NamedTempFile {
        NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_empty_settings_path_fails() {
        let params = Parameters::new("", "volumes.json");
        let err = create_instances(&params, &volumes(1), &MockProvider::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter { name: "pandora_settings_file" }
        ));
    }

    #[test]
    fn test_nonexistent_settings_file_fails() {
        let params = Parameters::new("/no/such/settings.xml", "volumes.json");
        let err = create_instances(&params, &volumes(1), &MockProvider::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::FileNotFound { .. }));
    }

    #[test]
    fn test_single_volume_uses_primary_only() {
        let settings = settings_file();
        let params = Parameters::new(settings.path(), "volumes.json");
        let provider = MockProvider::new();

        let contexts = create_instances(&params, &volumes(1), &provider).unwrap();

        assert!(!contexts.has_daughters());
        assert_eq!(contexts.primary().name(), PRIMARY_CONTEXT_NAME);
        assert_eq!(provider.created().len(), 1);

        let configs = provider.get(PRIMARY_CONTEXT_NAME).unwrap().configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].role, ContextRole::Primary);
        assert_eq!(configs[0].volumes.len(), 1);
    }

    #[test]
    fn test_multiple_volumes_without_stitching_settings_fail() {
        let settings = settings_file();
        let params = Parameters::new(settings.path(), "volumes.json");
        let err = create_instances(&params, &volumes(3), &MockProvider::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter { name: "stitching_settings_file" }
        ));
    }

    #[test]
    fn test_creates_one_daughter_per_volume_in_order() {
        let settings = settings_file();
        let stitching = settings_file();
        let params =
            Parameters::new(settings.path(), "volumes.json").with_stitching_settings(stitching.path());
        let provider = MockProvider::new();

        let contexts = create_instances(&params, &volumes(3), &provider).unwrap();

        let names: Vec<_> = contexts
            .daughters()
            .iter()
            .map(|d| d.context.name().to_string())
            .collect();
        assert_eq!(names, vec!["volume_0", "volume_1", "volume_2"]);

        let primary = provider.get(PRIMARY_CONTEXT_NAME).unwrap();
        assert_eq!(primary.registered_volumes(), vec![0, 1, 2]);
        let roles: Vec<_> = primary.configs().iter().map(|c| c.role).collect();
        assert_eq!(roles, vec![ContextRole::Primary, ContextRole::Stitching]);

        let daughter = provider.get("volume_1").unwrap();
        let config = &daughter.configs()[0];
        assert_eq!(config.role, ContextRole::Daughter);
        assert_eq!(config.volumes.len(), 1);
        assert_eq!(config.volumes[0].volume_id, 1);
    }

    #[test]
    fn test_volumes_without_context_are_not_given_daughters() {
        let settings = settings_file();
        let list = DriftVolumeList::new(vec![
            DriftVolume::new(0, [0.0; 3], [100.0; 3]),
            DriftVolume::new(1, [110.0, 0.0, 0.0], [100.0; 3]).without_context(),
        ])
        .unwrap();
        let params = Parameters::new(settings.path(), "volumes.json");

        let contexts = create_instances(&params, &list, &MockProvider::new()).unwrap();
        assert!(!contexts.has_daughters());
    }

    #[test]
    fn test_external_parameters_reach_every_context() {
        let settings = settings_file();
        let stitching = settings_file();
        let params =
            Parameters::new(settings.path(), "volumes.json").with_stitching_settings(stitching.path());
        let provider = MockProvider::new();

        create_instances(&params, &volumes(2), &provider).unwrap();

        for context in provider.created() {
            assert!(context
                .external_parameters()
                .iter()
                .any(|(k, v)| k == "ShouldRunSlicing" && v == "true"));
        }
    }

    #[test]
    fn test_provider_failure_surfaces_as_configuration_error() {
        let settings = settings_file();
        let stitching = settings_file();
        let params =
            Parameters::new(settings.path(), "volumes.json").with_stitching_settings(stitching.path());
        let provider = MockProvider::new();
        provider.fail_on_create("volume_1");

        let err = create_instances(&params, &volumes(2), &provider).unwrap_err();
        assert!(matches!(err, ConfigurationError::ContextCreation(_)));
    }
}
