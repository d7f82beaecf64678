//! Configuration loading traits and types.
//!
//! Provides a standardized way to load TOML configuration files across the
//! `railsim` workspace: a generic [`ConfigLoader`] blanket trait, the shared
//! [`SharedConfig`] fields every binary embeds, and the simulator-specific
//! [`SimulatorConfig`] / [`FabConfig`] / [`SensorPresetConfig`] structures.

use crate::vehicle::{LockGrantStrategy, TransferMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Log level for configuration (mirrors `tracing::Level` as a serde-friendly enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Common configuration fields shared across all `railsim` binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    pub service_name: String,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Default implementation works with any `serde::de::DeserializeOwned` type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Simulator configuration ───────────────────────────────────────

/// Top-level simulator configuration — the `MultiWorkerController`'s `INIT` input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub shared: Option<SharedConfig>,

    /// Number of worker tasks to spawn.
    pub worker_count: usize,

    /// Target tick rate in Hz (spec default 60).
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,

    /// Maximum delta clamp in seconds, applied when a tick overruns its budget.
    #[serde(default = "default_max_delta")]
    pub max_delta: f64,

    /// Per-fab configuration, in the order fabs are assigned to workers.
    pub fabs: Vec<FabConfig>,

    /// Sensor presets referenced by `FabConfig::default_preset` / per-edge overrides.
    #[serde(default)]
    pub sensor_presets: Vec<SensorPresetConfig>,
}

fn default_target_fps() -> f64 {
    60.0
}

fn default_max_delta() -> f64 {
    0.1
}

impl SimulatorConfig {
    /// Validate cross-field invariants not expressible through serde alone.
    ///
    /// Rejects zero fabs, duplicate fab ids, zero `worker_count`, and any
    /// `lock_grant_strategy` that isn't one of the closed set of known
    /// strategies (per the design note: unknown strategies are refused, not
    /// guessed at).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ValidationError(
                "worker_count must be >= 1".to_string(),
            ));
        }
        if self.fabs.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one fab must be configured".to_string(),
            ));
        }
        if self.target_fps <= 0.0 {
            return Err(ConfigError::ValidationError(
                "target_fps must be > 0".to_string(),
            ));
        }
        if self.max_delta <= 0.0 {
            return Err(ConfigError::ValidationError(
                "max_delta must be > 0".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for fab in &self.fabs {
            if !seen.insert(fab.fab_id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate fab_id: {}",
                    fab.fab_id
                )));
            }
            if fab.max_vehicles == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "fab {} max_vehicles must be >= 1",
                    fab.fab_id
                )));
            }
        }
        Ok(())
    }
}

/// Per-fab configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabConfig {
    pub fab_id: String,
    pub map_path: PathBuf,
    pub max_vehicles: u32,

    #[serde(default)]
    pub lock_grant_strategy: LockGrantStrategy,

    #[serde(default)]
    pub transfer_mode: TransferMode,

    /// Render-buffer world offset applied only at render-emission time.
    #[serde(default)]
    pub render_offset_x: f32,
    #[serde(default)]
    pub render_offset_y: f32,

    /// Speed cap (m/s) applied on `Linear` edges (§4.6 step 3).
    #[serde(default = "default_linear_max_speed")]
    pub linear_max_speed: f32,
    /// Speed cap (m/s) applied on any `EdgeKind::is_curve()` edge.
    #[serde(default = "default_curve_max_speed")]
    pub curve_max_speed: f32,

    /// `lockWaitDistanceFromMergingStr` (§4.5): distance from a merge node at
    /// which an ungranted vehicle on a straight entry edge is held.
    #[serde(default = "default_lock_wait_distance_straight")]
    pub lock_wait_distance_straight: f32,
    /// `lockWaitDistanceFromMergingCurve` (§4.5): same, for curve entries.
    #[serde(default = "default_lock_wait_distance_curve")]
    pub lock_wait_distance_curve: f32,
}

fn default_linear_max_speed() -> f32 {
    2.0
}

fn default_curve_max_speed() -> f32 {
    1.0
}

fn default_lock_wait_distance_straight() -> f32 {
    1.0
}

fn default_lock_wait_distance_curve() -> f32 {
    1.5
}

/// TOML-facing sensor preset configuration, matched by name in `FabConfig`/edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPresetConfig {
    pub name: String,
    pub approach_left: f32,
    pub approach_right: f32,
    pub approach_side_width: f32,
    pub approach_decel: f32,
    pub brake_left: f32,
    pub brake_right: f32,
    pub brake_side_width: f32,
    pub brake_decel: f32,
    pub stop_left: f32,
    pub stop_right: f32,
    pub stop_side_width: f32,
    pub stop_decel: f32,
    pub body_length: f32,
    pub body_width: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn log_level_default() {
        assert_eq!(default_log_level(), LogLevel::Info);
    }

    #[test]
    fn shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn config_loader_file_not_found() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let result = TestConfig::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn simulator_config_rejects_zero_fabs() {
        let cfg = SimulatorConfig {
            shared: None,
            worker_count: 1,
            target_fps: 60.0,
            max_delta: 0.1,
            fabs: vec![],
            sensor_presets: vec![],
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn simulator_config_rejects_duplicate_fab_ids() {
        let fab = FabConfig {
            fab_id: "fab_0".to_string(),
            map_path: PathBuf::from("map.toml"),
            max_vehicles: 10,
            lock_grant_strategy: LockGrantStrategy::Fifo,
            transfer_mode: TransferMode::Random,
            render_offset_x: 0.0,
            render_offset_y: 0.0,
            linear_max_speed: default_linear_max_speed(),
            curve_max_speed: default_curve_max_speed(),
            lock_wait_distance_straight: default_lock_wait_distance_straight(),
            lock_wait_distance_curve: default_lock_wait_distance_curve(),
        };
        let cfg = SimulatorConfig {
            shared: None,
            worker_count: 1,
            target_fps: 60.0,
            max_delta: 0.1,
            fabs: vec![fab.clone(), fab],
            sensor_presets: vec![],
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn simulator_config_loads_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
worker_count = 2
target_fps = 60.0

[[fabs]]
fab_id = "fab_0"
map_path = "maps/fab_0.toml"
max_vehicles = 100
lock_grant_strategy = "fifo"
transfer_mode = "loop"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let cfg = SimulatorConfig::load(file.path()).unwrap();
        assert_eq!(cfg.worker_count, 2);
        assert_eq!(cfg.fabs.len(), 1);
        assert_eq!(cfg.fabs[0].fab_id, "fab_0");
        assert!(cfg.validate().is_ok());
    }
}
