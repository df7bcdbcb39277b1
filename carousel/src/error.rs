//! Error taxonomy for the carousel controller.
//!
//! Every rejected command resolves to exactly one [`ErrorCode`] on the wire.
//! The state machine stays in its pre-command state whenever one of these
//! errors is returned, with the single exception of [`CarouselError::Fault`]
//! raised by an axis, which moves the whole controller into Fault.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Error codes carried by `ERROR <code>` response frames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or out-of-bounds frame; nothing changed
    InvalidCommand,
    /// Motion command while a motion is in progress
    Busy,
    /// Target outside the raster travel limits or unknown target preset
    OutOfRange,
    /// Controller is latched in Fault and needs a Reset
    Fault,
    /// Motion command before the axes have been homed
    NotHomed,
}

/// Hardware conditions that latch the controller into Fault.
///
/// Which of these are actually honoured is selected by
/// [`FaultTriggers`](crate::config::FaultTriggers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Driver reported a stall
    Stall,
    /// Travel limit switch tripped outside of homing
    LimitSwitch,
    /// Home reference not found within the configured travel
    HomingTimeout,
    /// Internal bookkeeping disagreed with the active mode
    InternalState,
}

/// Errors returned by carousel operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CarouselError {
    /// Frame could not be parsed or a field is outside protocol bounds.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A motion is already in progress; only STOP and STATUS are accepted.
    #[error("Carousel busy")]
    Busy,

    /// Motion requested before homing completed.
    #[error("Axes not homed")]
    NotHomed,

    /// Requested position is outside the configured travel.
    #[error("Target {target} outside travel [{min}, {max}]")]
    OutOfRange {
        /// Requested position in steps (or preset index)
        target: i64,
        /// Lowest allowed value
        min: i64,
        /// Highest allowed value
        max: i64,
    },

    /// Controller is latched in Fault.
    #[error("Carousel fault: {0}")]
    Fault(FaultKind),
}

impl CarouselError {
    /// Wire code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CarouselError::InvalidCommand(_) => ErrorCode::InvalidCommand,
            CarouselError::Busy => ErrorCode::Busy,
            CarouselError::NotHomed => ErrorCode::NotHomed,
            CarouselError::OutOfRange { .. } => ErrorCode::OutOfRange,
            CarouselError::Fault(_) => ErrorCode::Fault,
        }
    }
}

/// Result type for carousel operations.
pub type CarouselResult<T> = Result<T, CarouselError>;
