//! Multi-target carousel motion controller.
//!
//! This crate holds the device-side core of the PLD target carousel: two
//! stepper axes (target rotation and raster), the mode state machine that
//! coordinates them, and the framed serial protocol used to drive it from
//! the host.
//!
//! # Layers
//!
//! - [`pulse`] - step/direction/enable timing for one axis
//! - [`axis`] - absolute step tracking, homing, moves and soft limits
//! - [`state_machine`] - operating modes and legal transitions
//! - [`protocol`] - frame codec, typed commands and responses
//! - [`handler`] - decodes frames and dispatches them to the state machine
//! - [`device`] - the cooperative tick loop tying it all together
//!
//! The [`sim`] module provides a simulated axis plant so the whole stack can
//! run without hardware, which is how the tests and the `mock_carousel`
//! binary in the `hardware` crate exercise it.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use carousel::{CarouselConfig, Device};
//! use carousel::protocol::{encode_frame, Command, Response};
//!
//! let mut device = Device::simulated(CarouselConfig::default());
//! device.receive(&encode_frame(&Command::StatusQuery.to_payload()));
//! let reply = device.tick(Duration::from_millis(1));
//! assert!(!reply.is_empty());
//! ```

pub mod axis;
pub mod config;
pub mod device;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod pulse;
pub mod raster;
pub mod sim;
pub mod state_machine;
pub mod status;

pub use axis::{AxisController, AxisEvent, AxisHardware, AxisInputs, AxisKind};
pub use config::{AxisConfig, CarouselConfig, FaultTriggers, HomingMethod};
pub use device::Device;
pub use error::{CarouselError, CarouselResult, ErrorCode, FaultKind};
pub use handler::CommandHandler;
pub use pulse::{Direction, StepOutput, StepPulseGenerator};
pub use raster::RasterPlan;
pub use state_machine::{Carousel, Mode};
pub use status::{MotorEnable, StatusSnapshot};
