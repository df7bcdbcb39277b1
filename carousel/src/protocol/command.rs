//! Typed host commands.
//!
//! Payloads are space-separated ASCII: a keyword followed by its arguments.
//!
//! | Keyword  | Arguments                     |
//! |----------|-------------------------------|
//! | `HOME`   |                               |
//! | `ROTATE` | angle (deg), speed (deg/s)    |
//! | `RASTER` | start, end, count, speed      |
//! | `SPIN`   | speed (deg/s), `CW` or `CCW`  |
//! | `STOP`   |                               |
//! | `RESET`  |                               |
//! | `STATUS` |                               |
//! | `TARGET` | preset index, speed (deg/s)   |
//! | `JOG`    | `CW` or `CCW`, steps, speed   |

use std::str::FromStr;

use crate::config::MAX_TARGETS;
use crate::error::{CarouselError, CarouselResult};
use crate::pulse::Direction;

/// Largest rotation angle in degrees.
pub const MAX_ANGLE: f64 = 360.0;

/// Fastest rotation speed in degrees per second.
pub const MAX_ROTATION_SPEED: f64 = 3600.0;

/// Fastest raster speed in steps per second.
pub const MAX_RASTER_SPEED: f64 = 100_000.0;

/// Most positions in one raster.
pub const MAX_RASTER_COUNT: u32 = 1000;

/// Longest jog in steps.
pub const MAX_JOG_STEPS: u32 = 100_000;

/// A command sent from the host to the carousel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Home both axes
    Home,
    /// Rotate to an absolute angle
    Rotate {
        /// Degrees, `[0, 360]`
        angle: f64,
        /// Degrees per second
        speed: f64,
    },
    /// Step the raster axis through evenly spaced positions
    Raster {
        /// First position in steps
        start: i32,
        /// Last position in steps
        end: i32,
        /// Number of positions, start and end included
        count: u32,
        /// Steps per second
        speed: f64,
    },
    /// Spin the rotation axis until stopped
    Spin {
        /// Degrees per second
        speed: f64,
        /// Spin direction
        direction: Direction,
    },
    /// Stop all motion
    Stop,
    /// Clear a latched fault
    Reset,
    /// Request a status report
    StatusQuery,
    /// Rotate to a configured target preset
    Target {
        /// Preset index
        index: u8,
        /// Degrees per second
        speed: f64,
    },
    /// Move the raster axis by a relative number of steps
    Jog {
        /// Jog direction, clockwise is positive
        direction: Direction,
        /// Steps to move
        steps: u32,
        /// Steps per second
        speed: f64,
    },
}

fn invalid(message: impl Into<String>) -> CarouselError {
    CarouselError::InvalidCommand(message.into())
}

fn parse_arg<T: FromStr>(name: &str, token: &str) -> CarouselResult<T> {
    token
        .parse()
        .map_err(|_| invalid(format!("{name}: cannot parse {token:?}")))
}

fn check_finite(name: &str, value: f64) -> CarouselResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite")))
    }
}

fn check_speed(name: &str, value: f64, max: f64) -> CarouselResult<()> {
    check_finite(name, value)?;
    if value > 0.0 && value <= max {
        Ok(())
    } else {
        Err(invalid(format!("{name} {value} outside (0, {max}]")))
    }
}

impl Command {
    /// Protocol keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Home => "HOME",
            Command::Rotate { .. } => "ROTATE",
            Command::Raster { .. } => "RASTER",
            Command::Spin { .. } => "SPIN",
            Command::Stop => "STOP",
            Command::Reset => "RESET",
            Command::StatusQuery => "STATUS",
            Command::Target { .. } => "TARGET",
            Command::Jog { .. } => "JOG",
        }
    }

    /// Whether the command starts motion.
    pub fn is_motion(&self) -> bool {
        !matches!(self, Command::Stop | Command::Reset | Command::StatusQuery)
    }

    /// Check argument bounds.
    pub fn validate(&self) -> CarouselResult<()> {
        match *self {
            Command::Home | Command::Stop | Command::Reset | Command::StatusQuery => Ok(()),
            Command::Rotate { angle, speed } => {
                check_finite("angle", angle)?;
                if !(0.0..=MAX_ANGLE).contains(&angle) {
                    return Err(invalid(format!("angle {angle} outside [0, {MAX_ANGLE}]")));
                }
                check_speed("speed", speed, MAX_ROTATION_SPEED)
            }
            Command::Raster { count, speed, .. } => {
                if !(1..=MAX_RASTER_COUNT).contains(&count) {
                    return Err(invalid(format!(
                        "count {count} outside [1, {MAX_RASTER_COUNT}]"
                    )));
                }
                check_speed("speed", speed, MAX_RASTER_SPEED)
            }
            Command::Spin { speed, .. } => check_speed("speed", speed, MAX_ROTATION_SPEED),
            Command::Target { index, speed } => {
                if usize::from(index) >= MAX_TARGETS {
                    return Err(invalid(format!("target index {index} too large")));
                }
                check_speed("speed", speed, MAX_ROTATION_SPEED)
            }
            Command::Jog { steps, speed, .. } => {
                if !(1..=MAX_JOG_STEPS).contains(&steps) {
                    return Err(invalid(format!("steps {steps} outside [1, {MAX_JOG_STEPS}]")));
                }
                check_speed("speed", speed, MAX_RASTER_SPEED)
            }
        }
    }

    /// Encode as a frame payload.
    pub fn to_payload(&self) -> String {
        let keyword = self.keyword();
        match *self {
            Command::Home | Command::Stop | Command::Reset | Command::StatusQuery => {
                keyword.to_string()
            }
            Command::Rotate { angle, speed } => format!("{keyword} {angle} {speed}"),
            Command::Raster {
                start,
                end,
                count,
                speed,
            } => format!("{keyword} {start} {end} {count} {speed}"),
            Command::Spin { speed, direction } => format!("{keyword} {speed} {direction}"),
            Command::Target { index, speed } => format!("{keyword} {index} {speed}"),
            Command::Jog {
                direction,
                steps,
                speed,
            } => format!("{keyword} {direction} {steps} {speed}"),
        }
    }

    /// Decode and validate a frame payload.
    pub fn parse(payload: &str) -> CarouselResult<Self> {
        let mut tokens = payload.split_ascii_whitespace();
        let keyword = tokens.next().ok_or_else(|| invalid("empty command"))?;
        let args: Vec<&str> = tokens.collect();

        let expect_args = |n: usize| -> CarouselResult<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(invalid(format!(
                    "{keyword} takes {n} arguments, got {}",
                    args.len()
                )))
            }
        };
        let direction = |token: &str| -> CarouselResult<Direction> {
            Direction::from_str(token).map_err(|_| invalid(format!("bad direction {token:?}")))
        };

        let command = match keyword.to_ascii_uppercase().as_str() {
            "HOME" => {
                expect_args(0)?;
                Command::Home
            }
            "ROTATE" => {
                expect_args(2)?;
                Command::Rotate {
                    angle: parse_arg("angle", args[0])?,
                    speed: parse_arg("speed", args[1])?,
                }
            }
            "RASTER" => {
                expect_args(4)?;
                Command::Raster {
                    start: parse_arg("start", args[0])?,
                    end: parse_arg("end", args[1])?,
                    count: parse_arg("count", args[2])?,
                    speed: parse_arg("speed", args[3])?,
                }
            }
            "SPIN" => {
                expect_args(2)?;
                Command::Spin {
                    speed: parse_arg("speed", args[0])?,
                    direction: direction(args[1])?,
                }
            }
            "STOP" => {
                expect_args(0)?;
                Command::Stop
            }
            "RESET" => {
                expect_args(0)?;
                Command::Reset
            }
            "STATUS" => {
                expect_args(0)?;
                Command::StatusQuery
            }
            "TARGET" => {
                expect_args(2)?;
                Command::Target {
                    index: parse_arg("index", args[0])?,
                    speed: parse_arg("speed", args[1])?,
                }
            }
            "JOG" => {
                expect_args(3)?;
                Command::Jog {
                    direction: direction(args[0])?,
                    steps: parse_arg("steps", args[1])?,
                    speed: parse_arg("speed", args[2])?,
                }
            }
            _ => return Err(invalid(format!("unknown command {keyword:?}"))),
        };

        command.validate()?;
        Ok(command)
    }
}
