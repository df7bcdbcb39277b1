//! Simulated carousel hardware.
//!
//! A [`SimulatedAxis`] stands in for a stepper driver plus its switches. It
//! keeps its own "physical" position, which starts wherever the mechanism
//! happens to be at power-on and is moved only by step pulses, so the
//! controller has to home to discover it just like on the real carousel.
//! The home switch closes at physical position 0.
//!
//! Clones share state, so a test can hand one clone to the controller and
//! keep another to inspect positions or inject stall/limit signals.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::axis::{AxisHardware, AxisInputs};
use crate::config::CarouselConfig;
use crate::pulse::{Direction, StepOutput};

#[derive(Debug, Default)]
struct SimState {
    position: AtomicI64,
    pulses: AtomicU64,
    enabled: AtomicBool,
    stall: AtomicBool,
    limit: AtomicBool,
    enable_stuck: AtomicBool,
}

/// Simulated stepper axis with a home switch at physical zero.
#[derive(Debug, Clone)]
pub struct SimulatedAxis {
    state: Arc<SimState>,
    direction: Direction,
    modulus: Option<i64>,
}

impl SimulatedAxis {
    fn new(start: i64, modulus: Option<i64>) -> Self {
        let state = SimState::default();
        state.position.store(start, Ordering::SeqCst);
        Self {
            state: Arc::new(state),
            direction: Direction::Clockwise,
            modulus,
        }
    }

    /// Rotary axis wrapping every `steps_per_revolution` pulses.
    pub fn rotation(steps_per_revolution: u32, start: i64) -> Self {
        let modulus = i64::from(steps_per_revolution.max(1));
        Self::new(start.rem_euclid(modulus), Some(modulus))
    }

    /// Linear axis without wrap.
    pub fn linear(start: i64) -> Self {
        Self::new(start, None)
    }

    /// Where the mechanism actually is.
    pub fn physical_position(&self) -> i64 {
        self.state.position.load(Ordering::SeqCst)
    }

    /// Move the mechanism by hand (as if an operator turned it while unpowered).
    pub fn set_physical_position(&self, position: i64) {
        let position = match self.modulus {
            Some(m) => position.rem_euclid(m),
            None => position,
        };
        self.state.position.store(position, Ordering::SeqCst);
    }

    /// Total pulses received since creation.
    pub fn pulse_count(&self) -> u64 {
        self.state.pulses.load(Ordering::SeqCst)
    }

    /// Whether the driver enable line is asserted.
    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// Assert or release the driver stall output.
    pub fn inject_stall(&self, stalled: bool) {
        self.state.stall.store(stalled, Ordering::SeqCst);
    }

    /// Close or open the travel limit switch.
    pub fn inject_limit(&self, tripped: bool) {
        self.state.limit.store(tripped, Ordering::SeqCst);
    }

    /// Make the enable line ignore requests to release it.
    pub fn inject_stuck_enable(&self, stuck: bool) {
        self.state.enable_stuck.store(stuck, Ordering::SeqCst);
    }
}

impl StepOutput for SimulatedAxis {
    fn set_enabled(&mut self, enabled: bool) {
        if !enabled && self.state.enable_stuck.load(Ordering::SeqCst) {
            return;
        }
        self.state.enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn pulse(&mut self) {
        if !self.is_enabled() {
            return;
        }
        let next = self.physical_position() + self.direction.sign();
        self.set_physical_position(next);
        self.state.pulses.fetch_add(1, Ordering::SeqCst);
    }
}

impl AxisHardware for SimulatedAxis {
    fn read_inputs(&mut self) -> AxisInputs {
        AxisInputs {
            home_switch: self.physical_position() == 0,
            limit_switch: self.state.limit.load(Ordering::SeqCst),
            stall: self.state.stall.load(Ordering::SeqCst),
            driver_enabled: self.is_enabled(),
        }
    }
}

/// Both simulated axes of a carousel.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    /// Target rotation axis
    pub rotation: SimulatedAxis,
    /// Raster axis
    pub raster: SimulatedAxis,
}

impl SimulatedPlant {
    /// Create a plant whose mechanisms start at the given physical positions.
    pub fn new(config: &CarouselConfig, rotation_start: i64, raster_start: i64) -> Self {
        Self {
            rotation: SimulatedAxis::rotation(config.rotation.steps_per_revolution, rotation_start),
            raster: SimulatedAxis::linear(raster_start),
        }
    }
}
