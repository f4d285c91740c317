//! Configuration file loading and saving

use cleaner::CleanerConfig;
use cli_lib::settings;
use std::fs;
use tempfile::TempDir;

#[test]
fn partial_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "keep_last = 5\ndelete_orphaned_versions = true\n").unwrap();

    let config = settings::load(Some(&path)).unwrap();

    assert_eq!(config.keep_last, 5);
    assert!(config.delete_orphaned_versions);
    assert_eq!(config.long_history_threshold, 1000);
    assert_eq!(config.session_refresh_interval, 100);
    assert!(config.restart_from_last_position);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = settings::load(Some(&dir.path().join("absent.toml")));
    assert!(result.is_err());
}

#[test]
fn invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "long_history_threshold = 0\n").unwrap();

    let err = settings::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("long_history_threshold"));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "keep_last = \"many\"\n").unwrap();

    let err = settings::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn saved_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = CleanerConfig {
        keep_last: 3,
        subtree_path: Some("/jcr:system/jcr:versionStorage/aa".to_string()),
        skipped_paths: vec!["/jcr:system/jcr:versionStorage/zz".to_string()],
        pause_ms: 25,
        ..Default::default()
    };

    settings::save_to(&config, &path).unwrap();
    let loaded = settings::load_from(&path).unwrap();

    assert_eq!(loaded.keep_last, 3);
    assert_eq!(loaded.subtree_path, config.subtree_path);
    assert_eq!(loaded.skipped_paths, config.skipped_paths);
    assert_eq!(loaded.pause_ms, 25);
}
