//! Step pulse generation for a single stepper axis.
//!
//! The generator owns the timing side of a step/direction/enable driver: it
//! turns a commanded rate into a whole number of pulses per scheduling tick,
//! carrying the fractional remainder forward so long runs hold the exact
//! average rate. It knows nothing about positions, limits or carousel modes.
//!
//! Rate changes are latched and applied at the start of the next tick, so a
//! tick never mixes two rates.

use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, trace};

/// Motor rotation direction.
///
/// Clockwise counts positive steps on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Direction {
    /// Clockwise rotation (positive steps)
    #[strum(serialize = "CW")]
    Clockwise,
    /// Counter-clockwise rotation (negative steps)
    #[strum(serialize = "CCW")]
    CounterClockwise,
}

impl Direction {
    /// Signed step increment for one pulse in this direction.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }

    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }

    /// Direction that moves from `current` toward `target`.
    pub fn toward(current: i64, target: i64) -> Self {
        if target >= current {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }
    }
}

/// Output pins of a step/direction/enable driver.
///
/// Implemented by real GPIO back ends and by [`SimulatedAxis`](crate::sim::SimulatedAxis).
pub trait StepOutput {
    /// Drive the enable line.
    fn set_enabled(&mut self, enabled: bool);

    /// Drive the direction line. Only called between pulses.
    fn set_direction(&mut self, direction: Direction);

    /// Emit one complete step pulse.
    fn pulse(&mut self);
}

/// Rate-controlled pulse source for one axis.
#[derive(Debug, Clone)]
pub struct StepPulseGenerator {
    max_rate: f64,
    rate: f64,
    pending_rate: Option<f64>,
    direction: Direction,
    enabled: bool,
    phase: f64,
}

impl StepPulseGenerator {
    /// Create a disabled generator limited to `max_rate` steps per second.
    pub fn new(max_rate: f64) -> Self {
        Self {
            max_rate: max_rate.max(0.0),
            rate: 0.0,
            pending_rate: None,
            direction: Direction::Clockwise,
            enabled: false,
            phase: 0.0,
        }
    }

    /// Request a new step rate in steps per second.
    ///
    /// The value is clamped into `[0, max_rate]` (non-finite values become 0)
    /// and takes effect at the start of the next tick.
    pub fn set_rate(&mut self, steps_per_second: f64) {
        let clamped = if steps_per_second.is_finite() {
            steps_per_second.clamp(0.0, self.max_rate)
        } else {
            0.0
        };
        if clamped != steps_per_second {
            debug!(
                "Step rate {} clamped to {} (max {})",
                steps_per_second, clamped, self.max_rate
            );
        }
        self.pending_rate = Some(clamped);
    }

    /// Rate applied during the current tick.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Configured maximum rate in steps per second.
    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }

    /// Current direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether pulse output is gated on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the direction line. Must be called between pulses.
    pub fn set_direction<O: StepOutput + ?Sized>(&mut self, direction: Direction, out: &mut O) {
        if direction != self.direction {
            self.direction = direction;
            out.set_direction(direction);
        }
    }

    /// Gate pulse output on.
    pub fn enable<O: StepOutput + ?Sized>(&mut self, out: &mut O) {
        if !self.enabled {
            self.enabled = true;
            out.set_direction(self.direction);
            out.set_enabled(true);
        }
    }

    /// Gate pulse output off and drop any fractional pulse carried over.
    ///
    /// Idempotent. The enable line is driven low on every call.
    pub fn disable<O: StepOutput + ?Sized>(&mut self, out: &mut O) {
        self.enabled = false;
        out.set_enabled(false);
        self.phase = 0.0;
    }

    /// Start a scheduling tick of length `dt_secs` and return how many
    /// pulses are due in it.
    ///
    /// Latched rate changes are applied here, never mid-tick.
    pub fn begin_tick(&mut self, dt_secs: f64) -> u32 {
        if let Some(rate) = self.pending_rate.take() {
            self.rate = rate;
        }
        if !self.enabled || self.rate <= 0.0 || dt_secs <= 0.0 {
            return 0;
        }

        self.phase += self.rate * dt_secs;
        let due = self.phase.floor();
        self.phase -= due;
        let due = due.min(u32::MAX as f64) as u32;
        trace!("Tick {:.6}s at {} steps/s: {} pulses", dt_secs, self.rate, due);
        due
    }

    /// Emit one pulse in the current direction.
    ///
    /// Returns the signed position increment (`+1`, `-1`), or 0 if output
    /// is disabled.
    pub fn step<O: StepOutput + ?Sized>(&mut self, out: &mut O) -> i64 {
        if !self.enabled {
            return 0;
        }
        out.pulse();
        self.direction.sign()
    }
}
