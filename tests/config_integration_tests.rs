//! Integration tests for ConfigManager and settings file handling
//!
//! These tests verify:
//! - Default settings generation on first load
//! - Partial YAML files fall back to defaults per field
//! - Environment overrides (including nested heuristic keys)
//! - Pack root resolution against the config directory

use camino::Utf8PathBuf;
use soundscape::ConfigManager;
use soundscape::models::Settings;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn no_env() -> Option<HashMap<String, String>> {
    Some(HashMap::new())
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(manager.settings_path(), config_path.join("soundscape.yaml"));
    assert_eq!(manager.activation_path(), config_path.join("active_packs.json"));
    assert_eq!(manager.log_dir(), config_path.join("logs"));
}

#[test]
fn test_create_config_manager_creates_missing_directory() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("nested").join("config");

    let manager = ConfigManager::new(&nested).unwrap();

    assert!(nested.is_dir());
    assert_eq!(manager.config_dir(), &nested);
}

#[test]
fn test_load_default_settings_writes_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager.load_settings_with_env(no_env()).unwrap();

    assert_eq!(settings, Settings::default());
    assert!(manager.settings_path().exists());

    // The written file parses back to the same defaults
    let content = fs::read_to_string(manager.settings_path()).unwrap();
    let parsed: Settings = serde_yaml_ng::from_str(&content).unwrap();
    assert_eq!(parsed, Settings::default());
}

#[test]
fn test_partial_yaml_keeps_other_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.settings_path(),
        "override_other_music: true\nheuristics:\n  combat_radius: 12.5\n",
    )
    .unwrap();

    let settings = manager.load_settings_with_env(no_env()).unwrap();

    assert!(settings.override_other_music);
    assert_eq!(settings.heuristics.combat_radius, 12.5);
    assert_eq!(settings.heuristics.night_start, 13000);
    assert_eq!(settings.pack_root, "soundpacks");
    assert_eq!(settings.resource_namespace, "soundscape");
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.settings_path(), "tick_interval_ms: 500\n").unwrap();

    let env = HashMap::from([
        ("SOUNDSCAPE_TICK_INTERVAL_MS".to_string(), "250".to_string()),
        ("SOUNDSCAPE_DEBUG_MODE".to_string(), "true".to_string()),
        (
            "SOUNDSCAPE_HEURISTICS__VILLAGE_ENTITY_THRESHOLD".to_string(),
            "5".to_string(),
        ),
        // Not ours
        ("OTHER_TICK_INTERVAL_MS".to_string(), "1".to_string()),
    ]);

    let settings = manager.load_settings_with_env(Some(env)).unwrap();

    assert_eq!(settings.tick_interval_ms, 250);
    assert!(settings.debug_mode);
    assert_eq!(settings.heuristics.village_entity_threshold, 5);
}

#[test]
fn test_save_and_reload_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut settings = Settings::default();
    settings.pack_root = "/srv/packs".to_string();
    settings.pack_description = "Custom".to_string();
    settings.heuristics.excluded_vehicles = vec!["minecraft:boat".to_string()];
    manager.save_settings(&settings).unwrap();

    let loaded = manager.load_settings_with_env(no_env()).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.settings_path(), "tick_interval_ms: [not, a, number]\n").unwrap();

    assert!(manager.load_settings_with_env(no_env()).is_err());
}

#[test]
fn test_pack_root_resolution() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let relative = Settings::default();
    assert_eq!(manager.pack_root(&relative), config_path.join("soundpacks"));

    let absolute_root = config_path.join("elsewhere");
    let absolute = Settings {
        pack_root: absolute_root.to_string(),
        ..Settings::default()
    };
    assert_eq!(manager.pack_root(&absolute), absolute_root);
}
