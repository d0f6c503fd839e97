//! Configuration file – reads/writes `~/.aerostate/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use aerostate_runtime::EstimatorConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Persisted CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of every bus topic channel.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Capacity of the inbound sample queue.
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,

    #[serde(default)]
    pub estimator: EstimatorConfig,
}

fn default_bus_capacity() -> usize {
    256
}
fn default_input_capacity() -> usize {
    64
}

impl Config {
    /// Reject channel sizes the runtime cannot build.
    pub fn validate(&self) -> Result<(), String> {
        if self.bus_capacity == 0 {
            return Err("bus_capacity must be at least 1".to_string());
        }
        if self.input_capacity == 0 {
            return Err("input_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_capacity: default_bus_capacity(),
            input_capacity: default_input_capacity(),
            estimator: EstimatorConfig::default(),
        }
    }
}

/// Return the path to `~/.aerostate/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".aerostate").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.validate()
        .map_err(|e| format!("Invalid config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Load `path` (or defaults when it is missing) and apply environment
/// overrides.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `AEROSTATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `AEROSTATE_NAMESPACE` | `estimator.namespace` |
/// | `AEROSTATE_BASE_FRAME` | `estimator.base_frame` |
/// | `AEROSTATE_MODE` | exactly one of the mode switches (`odom_only`, `ground_truth`, `sensor_fusion`) |
/// | `AEROSTATE_FREQUENCY_HZ` | `estimator.frequency_hz` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let est = &mut cfg.estimator;
    if let Some(v) = lookup("AEROSTATE_NAMESPACE") {
        est.namespace = v;
    }
    if let Some(v) = lookup("AEROSTATE_BASE_FRAME") {
        est.base_frame = v;
    }
    if let Some(v) = lookup("AEROSTATE_MODE") {
        match v.trim() {
            "odom_only" => (est.odom_only, est.ground_truth, est.sensor_fusion) = (true, false, false),
            "ground_truth" => (est.odom_only, est.ground_truth, est.sensor_fusion) = (false, true, false),
            "sensor_fusion" => (est.odom_only, est.ground_truth, est.sensor_fusion) = (false, false, true),
            other => warn!(value = other, "ignoring unknown AEROSTATE_MODE"),
        }
    }
    if let Some(v) = lookup("AEROSTATE_FREQUENCY_HZ") {
        match v.trim().parse::<f64>() {
            Ok(hz) => est.frequency_hz = hz,
            Err(_) => warn!(value = %v, "ignoring invalid AEROSTATE_FREQUENCY_HZ"),
        }
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
