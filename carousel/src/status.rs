//! Immutable status snapshots.

use bitflags::bitflags;

use crate::state_machine::Mode;

bitflags! {
    /// Motor driver enable lines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MotorEnable: u8 {
        /// Rotation axis driver enabled
        const ROTATION = 0b0000_0001;
        /// Raster axis driver enabled
        const RASTER = 0b0000_0010;
    }
}

/// Point-in-time view of the carousel, as reported by `STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Active operating mode
    pub mode: Mode,
    /// Rotation axis position in steps, `[0, steps_per_revolution)`
    pub rotation_position: i64,
    /// Raster axis position in steps
    pub raster_position: i64,
    /// Which drivers are enabled
    pub motors: MotorEnable,
    /// Fault latched, Reset required
    pub fault: bool,
    /// Both axes homed since power-on or the last Reset
    pub homed: bool,
}

impl StatusSnapshot {
    /// Whether a motion command would be accepted right now (ignoring homing).
    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    /// Rotation position converted to degrees.
    pub fn rotation_degrees(&self, steps_per_revolution: u32) -> f64 {
        self.rotation_position as f64 * 360.0 / f64::from(steps_per_revolution.max(1))
    }
}
