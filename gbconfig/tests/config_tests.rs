//! Loading configuration from a directory

use std::fs;
use std::time::Duration;

use gbconfig::{CONFIG_FILE_NAME, Config};
use tempfile::TempDir;

fn config_dir_with(yaml: &str) -> TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join(CONFIG_FILE_NAME), yaml).unwrap();
    temp_dir
}

#[test]
fn test_missing_file_uses_defaults_and_writes_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();

    assert_eq!(
        config.get_stream_url(),
        "https://gurbanikirtan.radioca.st/start.mp3"
    );
    assert_eq!(config.get_poll_interval(), Duration::from_secs(15));
    assert!(!temp_dir.path().join(CONFIG_FILE_NAME).exists());
}

#[test]
fn test_file_values_override_defaults() {
    let temp_dir = config_dir_with(
        "radio:\n  stream_url: http://localhost:8000/live.mp3\n  metadata:\n    poll_interval_secs: 5\n",
    );
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();

    assert_eq!(config.get_stream_url(), "http://localhost:8000/live.mp3");
    assert_eq!(config.get_poll_interval_secs(), 5);
    // Les clés absentes du fichier gardent leur valeur par défaut
    assert_eq!(
        config.get_metadata_url(),
        "https://gurbanikirtan.radioca.st/currentsong?sid=1"
    );
    assert_eq!(config.get_fallback_title(), "Live Gurbani Kirtan");
}

#[test]
fn test_keys_are_case_insensitive() {
    let temp_dir = config_dir_with("Radio:\n  Metadata:\n    Fallback_Title: Kirtan\n");
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();

    assert_eq!(config.get_fallback_title(), "Kirtan");
    assert_eq!(
        config.get_value(&["RADIO", "METADATA", "FALLBACK_TITLE"]).unwrap(),
        serde_yaml::Value::String("Kirtan".into())
    );
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let temp_dir = config_dir_with("radio: [unclosed");
    assert!(Config::load_config(temp_dir.path().to_str().unwrap()).is_err());
}

#[test]
fn test_save_round_trips() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().join("nested");
    let config = Config::load_config(dir.to_str().unwrap()).unwrap();

    config.set_metadata_url("http://localhost/currentsong").unwrap();
    config.set_duck_others(false).unwrap();
    config.save().unwrap();

    let reloaded = Config::load_config(dir.to_str().unwrap()).unwrap();
    assert_eq!(reloaded.get_metadata_url(), "http://localhost/currentsong");
    assert!(!reloaded.get_duck_others());
}

#[test]
fn test_relative_log_file_resolves_against_config_dir() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();

    assert_eq!(config.get_log_file(), temp_dir.path().join("gurbani247.log"));

    config.set_log_file("/tmp/radio.log").unwrap();
    assert_eq!(config.get_log_file(), std::path::PathBuf::from("/tmp/radio.log"));
}
