//! Device configuration for the carousel controller.
//!
//! Loaded once at power-on from a JSON file and treated as immutable for the
//! session. Every field has a default matching the bench carousel, so a
//! config file only needs to list what differs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of target presets the carousel can hold.
pub const MAX_TARGETS: usize = 16;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values are individually valid but make no sense together.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How an axis finds its mechanical zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum HomingMethod {
    /// Drive in reverse until the home switch closes.
    ///
    /// Gives up after `max_steps` pulses.
    Sensor { max_steps: u64 },
    /// Drive in reverse for exactly `steps` pulses against a hard stop.
    TimedTravel { steps: u64 },
}

/// Static parameters of one stepper axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    /// Microsteps per full motor revolution
    pub steps_per_revolution: u32,
    /// Upper bound for any commanded step rate (steps/s)
    pub max_step_rate: f64,
    /// Lowest allowed absolute position in steps (raster axis only)
    pub travel_min: i64,
    /// Highest allowed absolute position in steps (raster axis only)
    pub travel_max: i64,
    /// Homing procedure
    pub homing: HomingMethod,
    /// Step rate used while homing (steps/s)
    pub homing_rate: f64,
}

impl AxisConfig {
    /// Bench defaults for the target rotation axis.
    pub fn rotation_default() -> Self {
        Self {
            steps_per_revolution: 3200,
            max_step_rate: 3200.0,
            travel_min: 0,
            travel_max: 3199,
            homing: HomingMethod::Sensor { max_steps: 6400 },
            homing_rate: 800.0,
        }
    }

    /// Bench defaults for the raster axis.
    pub fn raster_default() -> Self {
        Self {
            steps_per_revolution: 3200,
            max_step_rate: 4000.0,
            travel_min: 0,
            travel_max: 8000,
            homing: HomingMethod::Sensor { max_steps: 12_000 },
            homing_rate: 1000.0,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.steps_per_revolution == 0 {
            return Err(ConfigError::Invalid(format!(
                "{name}: steps_per_revolution must be positive"
            )));
        }
        if !(self.max_step_rate.is_finite() && self.max_step_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{name}: max_step_rate must be positive"
            )));
        }
        if !(self.homing_rate.is_finite() && self.homing_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{name}: homing_rate must be positive"
            )));
        }
        if self.travel_min > self.travel_max {
            return Err(ConfigError::Invalid(format!(
                "{name}: travel_min {} above travel_max {}",
                self.travel_min, self.travel_max
            )));
        }
        Ok(())
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self::rotation_default()
    }
}

/// Sensor signals that latch the controller into Fault.
///
/// Exactly which hardware signals should count as faults depends on the
/// carousel revision, so each one can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultTriggers {
    /// Driver stall output
    pub stall: bool,
    /// Travel limit switch closed outside of homing
    pub limit_switch: bool,
    /// Home reference not found within the homing travel
    pub homing_timeout: bool,
}

impl Default for FaultTriggers {
    fn default() -> Self {
        Self {
            stall: true,
            limit_switch: true,
            homing_timeout: true,
        }
    }
}

/// Full device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Target rotation axis
    pub rotation: AxisConfig,
    /// Raster axis
    pub raster: AxisConfig,
    /// Control loop period in milliseconds
    pub tick_period_ms: u64,
    /// Rotation speed held while rastering (deg/s, 0 holds the rotation axis)
    pub raster_rotation_speed: f64,
    /// Preset target angles in degrees, indexed by `TARGET <index>`
    pub target_angles: Vec<f64>,
    /// Reject motion commands until a Home has completed
    pub require_homing: bool,
    /// Which sensor signals count as faults
    pub fault_triggers: FaultTriggers,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            rotation: AxisConfig::rotation_default(),
            raster: AxisConfig::raster_default(),
            tick_period_ms: 1,
            raster_rotation_speed: 0.0,
            target_angles: vec![0.0, 14.0, 74.0, 134.0, 194.0, 254.0, 314.0],
            require_homing: true,
            fault_triggers: FaultTriggers::default(),
        }
    }
}

impl CarouselConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rotation.validate("rotation")?;
        self.raster.validate("raster")?;

        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_period_ms must be positive".to_string(),
            ));
        }
        if !(self.raster_rotation_speed.is_finite() && self.raster_rotation_speed >= 0.0) {
            return Err(ConfigError::Invalid(
                "raster_rotation_speed must be non-negative".to_string(),
            ));
        }
        if self.target_angles.len() > MAX_TARGETS {
            return Err(ConfigError::Invalid(format!(
                "at most {MAX_TARGETS} target presets, got {}",
                self.target_angles.len()
            )));
        }
        if let Some(bad) = self
            .target_angles
            .iter()
            .find(|a| !(a.is_finite() && (0.0..=360.0).contains(*a)))
        {
            return Err(ConfigError::Invalid(format!(
                "target angle {bad} outside [0, 360]"
            )));
        }
        Ok(())
    }

    /// Control loop period as a [`Duration`](std::time::Duration).
    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_period_ms)
    }
}
