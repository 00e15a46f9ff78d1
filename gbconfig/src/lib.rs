//! # Gurbani 24/7 Configuration Module
//!
//! This module provides configuration management for Gurbani 24/7, including:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Typed getters and setters for configuration values
//! - Process-wide lazy access
//!
//! Loading never writes to disk; call [`Config::save`] explicitly to persist
//! changes.
//!
//! ## Usage
//!
//! ```no_run
//! use gbconfig::get_config;
//!
//! let config = get_config();
//! let stream = config.get_stream_url();
//! let every = config.get_poll_interval();
//!
//! config.set_poll_interval_secs(30)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("gurbani247.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(Config::load_config("").unwrap_or_else(|err| {
        warn!("Failed to load Gurbani 24/7 configuration: {err:#}, using defaults");
        Config::defaults()
    }));
}

/// Env var naming the configuration directory
pub const ENV_CONFIG_DIR: &str = "GURBANI247_CONFIG";
/// Prefix of per-key env overrides, path segments separated by `__`
pub const ENV_PREFIX: &str = "GURBANI247_CONFIG__";
/// Name of the configuration directory in `.` and `$HOME`
pub const CONFIG_DIR_NAME: &str = ".gurbani247";
/// File read from the configuration directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

// Default values for configuration
const DEFAULT_STREAM_URL: &str = "https://gurbanikirtan.radioca.st/start.mp3";
const DEFAULT_METADATA_URL: &str = "https://gurbanikirtan.radioca.st/currentsong?sid=1";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INITIAL_TITLE: &str = "Loading current shabad...";
const DEFAULT_FALLBACK_TITLE: &str = "Live Gurbani Kirtan";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_FILE: &str = "gurbani247.log";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or($default),
                Ok(Value::String(s)) => s.trim().parse::<u64>().unwrap_or_else(|_| {
                    warn!(key = %$path.join("."), value = %s, "Invalid number, using default {}", $default);
                    $default
                }),
                Ok(other) => {
                    warn!(key = %$path.join("."), ?other, "Not a number, using default {}", $default);
                    $default
                }
                Err(_) => $default,
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for non-empty string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => s,
                Ok(Value::Null) | Err(_) => $default.to_string(),
                Ok(other) => {
                    warn!(key = %$path.join("."), ?other, "Not a string, using default");
                    $default.to_string()
                }
            }
        }

        pub fn $setter(&self, value: impl Into<String>) -> Result<()> {
            self.set_value($path, Value::String(value.into()))
        }
    };
}

/// Configuration manager for Gurbani 24/7
///
/// # Examples
///
/// ```no_run
/// use gbconfig::Config;
///
/// let config = Config::load_config("/etc/gurbani247")?;
/// println!("Streaming {}", config.get_stream_url());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data.lock().clone()),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> PathBuf {
        // 1. Try provided directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        // Default fallback
        PathBuf::from(CONFIG_DIR_NAME)
    }

    /// Determines the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `GURBANI247_CONFIG` environment variable
    /// 3. `.gurbani247` in the current directory
    /// 4. `.gurbani247` in the user's home directory
    ///
    /// The directory does not need to exist.
    pub fn config_dir(directory: &str) -> PathBuf {
        Self::find_config_dir(directory)
    }

    /// Configuration built from the embedded defaults only
    pub fn defaults() -> Self {
        let config_dir = PathBuf::from(CONFIG_DIR_NAME);
        let data = serde_yaml::from_str::<Value>(DEFAULT_CONFIG)
            .map(Self::lower_keys_value)
            .unwrap_or_else(|_| Value::Mapping(Mapping::new()));
        Self {
            path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            data: Mutex::new(data),
        }
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);
        let mut config_value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)
                    .map_err(|e| anyhow!("Invalid YAML in {}: {}", path.display(), e))?;
                // Les clés sont insensibles à la casse des deux côtés
                merge_yaml(&mut config_value, &Self::lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path.display(), "Config file not found, using default embedded config");
            }
        }

        Self::apply_env_overrides(&mut config_value, env::vars());

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    /// Directory the configuration was looked up in
    pub fn dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the config.yaml file
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        let yaml = {
            let data = self.data.lock();
            serde_yaml::to_string(&*data)?
        };
        fs::write(&self.path, yaml)?;
        info!(config_file = %self.path.display(), "Saved configuration");
        Ok(())
    }

    /// Sets a configuration value at the specified path (in memory)
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["radio", "stream_url"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock();
        Self::set_value_internal(&mut data, path, value)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Applies `GURBANI247_CONFIG__A__B=value` pairs onto `config`.
    fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var = %key, "Ignoring config override: {}", err);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_string_config!(
        get_stream_url,
        set_stream_url,
        &["radio", "stream_url"],
        DEFAULT_STREAM_URL
    );

    impl_string_config!(
        get_metadata_url,
        set_metadata_url,
        &["radio", "metadata", "url"],
        DEFAULT_METADATA_URL
    );

    impl_u64_config!(
        get_poll_interval_secs,
        set_poll_interval_secs,
        &["radio", "metadata", "poll_interval_secs"],
        DEFAULT_POLL_INTERVAL_SECS
    );

    impl_u64_config!(
        get_metadata_timeout_secs,
        set_metadata_timeout_secs,
        &["radio", "metadata", "timeout_secs"],
        DEFAULT_METADATA_TIMEOUT_SECS
    );

    impl_string_config!(
        get_initial_title,
        set_initial_title,
        &["radio", "metadata", "initial_title"],
        DEFAULT_INITIAL_TITLE
    );

    impl_string_config!(
        get_fallback_title,
        set_fallback_title,
        &["radio", "metadata", "fallback_title"],
        DEFAULT_FALLBACK_TITLE
    );

    impl_bool_config!(
        get_background_playback,
        set_background_playback,
        &["radio", "audio_session", "background_playback"],
        true
    );

    impl_bool_config!(
        get_duck_others,
        set_duck_others,
        &["radio", "audio_session", "duck_others"],
        true
    );

    impl_bool_config!(
        get_allow_recording,
        set_allow_recording,
        &["radio", "audio_session", "allow_recording"],
        false
    );

    impl_bool_config!(
        get_play_through_earpiece,
        set_play_through_earpiece,
        &["radio", "audio_session", "play_through_earpiece"],
        false
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    /// Polling period of the now-playing endpoint, never zero
    pub fn get_poll_interval(&self) -> Duration {
        Duration::from_secs(self.get_poll_interval_secs().max(1))
    }

    /// Timeout of one metadata request, never zero
    pub fn get_metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.get_metadata_timeout_secs().max(1))
    }

    /// Log file, resolved against the config directory when relative
    pub fn get_log_file(&self) -> PathBuf {
        let file = match self.get_value(&["host", "logger", "file"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => DEFAULT_LOG_FILE.to_string(),
        };
        let path = PathBuf::from(file);
        if path.is_absolute() {
            path
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn set_log_file(&self, file: impl Into<String>) -> Result<()> {
        self.set_value(&["host", "logger", "file"], Value::String(file.into()))
    }
}

/// Returns the global configuration instance
///
/// Lazily loaded on first access; falls back to the embedded defaults when
/// the configuration file cannot be read.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from external are merged into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // pour les scalaires ou séquences, on remplace
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::defaults();
        assert_eq!(config.get_stream_url(), DEFAULT_STREAM_URL);
        assert_eq!(config.get_metadata_url(), DEFAULT_METADATA_URL);
        assert_eq!(config.get_poll_interval(), Duration::from_secs(15));
        assert_eq!(config.get_metadata_timeout(), Duration::from_secs(10));
        assert_eq!(config.get_initial_title(), "Loading current shabad...");
        assert_eq!(config.get_fallback_title(), "Live Gurbani Kirtan");
        assert!(config.get_background_playback());
        assert!(config.get_duck_others());
        assert!(!config.get_allow_recording());
        assert!(!config.get_play_through_earpiece());
        assert_eq!(config.get_log_min_level(), "INFO");
    }

    #[test]
    fn test_env_overrides() {
        let mut value = Config::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG).unwrap());
        let vars = vec![
            (
                "GURBANI247_CONFIG__RADIO__STREAM_URL".to_string(),
                "http://localhost/live.mp3".to_string(),
            ),
            (
                "GURBANI247_CONFIG__RADIO__METADATA__POLL_INTERVAL_SECS".to_string(),
                "30".to_string(),
            ),
            ("UNRELATED".to_string(), "ignored".to_string()),
        ];
        Config::apply_env_overrides(&mut value, vars);

        let config = Config::defaults();
        config.set_value(&[], value).unwrap();
        assert_eq!(config.get_stream_url(), "http://localhost/live.mp3");
        assert_eq!(config.get_poll_interval_secs(), 30);
        assert_eq!(config.get_metadata_url(), DEFAULT_METADATA_URL);
    }

    #[test]
    fn test_merge_yaml_replaces_scalars_and_keeps_siblings() {
        let mut default: Value = serde_yaml::from_str("a: {b: 1, c: 2}").unwrap();
        let external: Value = serde_yaml::from_str("a: {c: 3, d: 4}").unwrap();
        merge_yaml(&mut default, &external);

        let expected: Value = serde_yaml::from_str("a: {b: 1, c: 3, d: 4}").unwrap();
        assert_eq!(default, expected);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = Config::defaults();
        config
            .set_value(
                &["radio", "metadata", "poll_interval_secs"],
                Value::String("soon".into()),
            )
            .unwrap();
        config
            .set_value(&["radio", "stream_url"], Value::Bool(true))
            .unwrap();
        config
            .set_value(&["radio", "metadata", "timeout_secs"], Value::Number(0.into()))
            .unwrap();

        assert_eq!(config.get_poll_interval_secs(), DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(config.get_stream_url(), DEFAULT_STREAM_URL);
        assert_eq!(config.get_metadata_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_get_value_missing_path() {
        let config = Config::defaults();
        let err = config.get_value(&["radio", "nope", "deeper"]).unwrap_err();
        assert_eq!(err.to_string(), "Path radio.nope does not exist");
    }
}
