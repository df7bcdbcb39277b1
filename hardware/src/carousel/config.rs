//! Host-side session configuration.

use std::path::Path;
use std::time::Duration;

use ::carousel::protocol::{MAX_JOG_STEPS, MAX_RASTER_SPEED, MAX_ROTATION_SPEED};
use serde::{Deserialize, Serialize};

use super::driver::{DriverError, DriverResult};

/// Longest accepted response timeout (ms).
pub const MAX_RESPONSE_TIMEOUT_MS: u64 = 60_000;

/// Longest accepted status poll interval (ms).
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// Connection and default-speed settings for the host driver.
///
/// Loaded once at startup from JSON; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial device path (`/dev/ttyUSB0`, `COM2`, ...)
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// How long to wait for a response frame (ms)
    pub response_timeout_ms: u64,
    /// Interval between `STATUS` polls while waiting for motion (ms)
    pub poll_interval_ms: u64,
    /// Address of a `mock_carousel` instance, used instead of the serial port
    pub tcp_address: Option<String>,
    /// Default rotation speed (deg/s)
    pub rotation_speed: f64,
    /// Default raster speed (steps/s)
    pub raster_speed: f64,
    /// Default raster jog length (steps)
    pub jog_steps: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            response_timeout_ms: 1000,
            poll_interval_ms: 50,
            tcp_address: None,
            rotation_speed: 10.0,
            raster_speed: 500.0,
            jog_steps: 100,
        }
    }
}

impl HostConfig {
    /// Load and validate from a JSON file.
    pub fn load_from_file(path: &Path) -> DriverResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| DriverError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> DriverResult<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> DriverResult<()> {
        if self.baud_rate == 0 {
            return Err(DriverError::Config("baud_rate must be positive".to_string()));
        }
        if !(1..=MAX_RESPONSE_TIMEOUT_MS).contains(&self.response_timeout_ms) {
            return Err(DriverError::Config(format!(
                "response_timeout_ms {} outside [1, {MAX_RESPONSE_TIMEOUT_MS}]",
                self.response_timeout_ms
            )));
        }
        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(DriverError::Config(format!(
                "poll_interval_ms {} outside [1, {MAX_POLL_INTERVAL_MS}]",
                self.poll_interval_ms
            )));
        }
        if !(self.rotation_speed > 0.0 && self.rotation_speed <= MAX_ROTATION_SPEED) {
            return Err(DriverError::Config(format!(
                "rotation_speed {} outside (0, {MAX_ROTATION_SPEED}]",
                self.rotation_speed
            )));
        }
        if !(self.raster_speed > 0.0 && self.raster_speed <= MAX_RASTER_SPEED) {
            return Err(DriverError::Config(format!(
                "raster_speed {} outside (0, {MAX_RASTER_SPEED}]",
                self.raster_speed
            )));
        }
        if !(1..=MAX_JOG_STEPS).contains(&self.jog_steps) {
            return Err(DriverError::Config(format!(
                "jog_steps {} outside [1, {MAX_JOG_STEPS}]",
                self.jog_steps
            )));
        }
        Ok(())
    }

    /// Response timeout as a [`Duration`].
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
