//! Config loading from files, typo detection and service construction.

use std::fs;

use plate_digitizer::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use plate_digitizer::config::{CatalogBackend, ConfigError, DigitizerConfig};
use plate_digitizer::PlateService;

#[test]
fn test_static_catalog_config_builds_a_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digitizer.toml");
    let workspace = dir.path().display().to_string().replace('\\', "/");
    fs::write(
        &path,
        format!(
            r#"
[workspace]
cache_dir = "{workspace}/cache"
output_dir = "{workspace}/out"
settings_file = "{workspace}/settings.json"
plate_extensions = ["tif"]

[catalog]
backend = "static"

[[catalog.entries]]
name = "Vega"
main_id = "* alf Lyr"
ra2000 = "18:36:56.3364"
dec2000 = "+38:47:01.280"

[export]
provenance_footer = "Digitized at La Plata."
"#
        ),
    )
    .unwrap();

    let config = DigitizerConfig::load_from_file(&path).unwrap();
    assert_eq!(config.catalog.backend, CatalogBackend::Static);
    assert_eq!(config.workspace.plate_extensions, ["tif"]);
    assert_eq!(config.export_options().provenance_footer, "Digitized at La Plata.");

    let service = PlateService::from_config(config).unwrap();
    assert!(dir.path().join("cache").join("working").is_dir());
    assert!(dir.path().join("cache").join("saved").is_dir());
    assert_eq!(service.schema().first().map(|f| f.key.as_str()), Some("OBJECT"));
}

#[test]
fn test_invalid_values_are_all_reported() {
    let err = DigitizerConfig::from_toml_str(
        r#"
[limits]
blocking_workers = 0
lookup_timeout_secs = 0

[catalog]
endpoint = "simbad.example"

[[sites]]
code = "bad"
latitude = 123.0
longitude = 0.0
utc_offset_hours = 0.0
"#,
    )
    .unwrap_err();

    let ConfigError::Validation(errors) = err else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.len(), 4, "{errors:#?}");
    assert!(errors.iter().any(|e| e.contains("catalog.endpoint")));
    assert!(errors.iter().any(|e| e.contains("sites[0].latitude")));
}

#[test]
fn test_service_rejects_invalid_config() {
    let mut config = DigitizerConfig::for_workspace(tempfile::tempdir().unwrap().path());
    config.schema.clear();
    assert!(matches!(
        PlateService::from_config(config),
        Err(plate_digitizer::Error::Config(ConfigError::Validation(_)))
    ));
}

#[test]
fn test_typo_in_section_key_is_suggested() {
    let warnings = validate_unknown_keys("[limits]\nexport_timeout_sec = 60\n");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("limits.export_timeout_secs"));
}

#[test]
fn test_far_off_keys_get_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely.unrelated.key", &known), None);
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digitizer.toml");
    let mut config = DigitizerConfig::for_workspace(dir.path());
    config.limits.export_timeout_secs = 42;
    config.save_to_file(&path).unwrap();

    let back = DigitizerConfig::load_from_file(&path).unwrap();
    assert_eq!(back.limits.export_timeout_secs, 42);
    assert_eq!(back.workspace.output_dir, config.workspace.output_dir);
}

#[test]
fn test_save_replaces_file_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf").join("digitizer.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[limits\n").unwrap();

    let config = DigitizerConfig::for_workspace(dir.path());
    config.save_to_file(&path).unwrap();

    assert!(DigitizerConfig::load_from_file(&path).is_ok());
    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, ["digitizer.toml"]);
}
