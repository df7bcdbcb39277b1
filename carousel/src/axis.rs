//! Axis controller: absolute position tracking for one stepper axis.
//!
//! Steppers are open loop, so the controller is the only source of truth for
//! where an axis is. Position changes only when a pulse is actually emitted,
//! and is assigned directly only when homing completes. Everything here is
//! incremental: commands set up a motion, and [`AxisController::tick`]
//! advances it by one scheduling period.
//!
//! The rotation axis wraps modulo one revolution. The raster axis has hard
//! travel limits and rejects targets outside them.

use strum::{Display, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::config::{AxisConfig, FaultTriggers, HomingMethod};
use crate::error::{CarouselError, CarouselResult, FaultKind};
use crate::pulse::{Direction, StepOutput, StepPulseGenerator};

/// Which carousel degree of freedom an axis drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum AxisKind {
    /// Target rotation, wraps every revolution
    Rotation,
    /// Raster sweep, bounded travel
    Raster,
}

/// Digital inputs sampled from an axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisInputs {
    /// Home reference switch closed
    pub home_switch: bool,
    /// Travel limit switch closed
    pub limit_switch: bool,
    /// Driver stall output asserted
    pub stall: bool,
    /// Driver enable line reads back as asserted
    pub driver_enabled: bool,
}

/// Hardware behind one axis: driver outputs plus sensor inputs.
pub trait AxisHardware: StepOutput + Send {
    /// Sample the axis inputs.
    fn read_inputs(&mut self) -> AxisInputs;
}

/// Outcome of advancing an axis by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisEvent {
    /// No motion in progress
    Idle,
    /// Motion in progress
    Moving,
    /// A `move_to` reached its target this tick
    Completed,
    /// Homing finished this tick; position is now zero
    Homed,
    /// A fault was detected and the axis has been stopped
    Fault(FaultKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion {
    Idle,
    Homing { method: HomingMethod, travelled: u64 },
    MoveTo { target: i64 },
    Continuous,
}

/// Position-tracking controller for one axis.
pub struct AxisController {
    kind: AxisKind,
    config: AxisConfig,
    triggers: FaultTriggers,
    position: i64,
    homed: bool,
    motion: Motion,
    pulses: StepPulseGenerator,
    hardware: Box<dyn AxisHardware>,
}

impl AxisController {
    /// Create an idle, unhomed axis at position 0.
    pub fn new(
        kind: AxisKind,
        config: AxisConfig,
        triggers: FaultTriggers,
        hardware: Box<dyn AxisHardware>,
    ) -> Self {
        let pulses = StepPulseGenerator::new(config.max_step_rate);
        Self {
            kind,
            config,
            triggers,
            position: 0,
            homed: false,
            motion: Motion::Idle,
            pulses,
            hardware,
        }
    }

    /// Which axis this is.
    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// Position in steps after the last completed pulse.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Whether homing has completed since power-on or the last reset.
    pub fn is_homed(&self) -> bool {
        self.homed
    }

    /// Forget the home reference, e.g. after a fault may have lost steps.
    pub fn clear_homed(&mut self) {
        self.homed = false;
    }

    /// Whether any motion (including homing) is in progress.
    pub fn is_moving(&self) -> bool {
        self.motion != Motion::Idle
    }

    /// Whether the driver is enabled.
    pub fn is_enabled(&self) -> bool {
        self.pulses.is_enabled()
    }

    /// Target of the current `move_to`, if any.
    pub fn target(&self) -> Option<i64> {
        match self.motion {
            Motion::MoveTo { target } => Some(target),
            _ => None,
        }
    }

    /// Microsteps per revolution.
    pub fn steps_per_revolution(&self) -> u32 {
        self.config.steps_per_revolution
    }

    fn wrap(&self, steps: i64) -> i64 {
        match self.kind {
            AxisKind::Rotation => steps.rem_euclid(i64::from(self.config.steps_per_revolution)),
            AxisKind::Raster => steps,
        }
    }

    /// Check a target against the travel limits without moving.
    ///
    /// The rotation axis accepts any target.
    pub fn check_target(&self, target: i64) -> CarouselResult<()> {
        if self.kind == AxisKind::Raster
            && !(self.config.travel_min..=self.config.travel_max).contains(&target)
        {
            return Err(CarouselError::OutOfRange {
                target,
                min: self.config.travel_min,
                max: self.config.travel_max,
            });
        }
        Ok(())
    }

    fn start(&mut self, motion: Motion, direction: Direction, rate: f64) {
        let out = self.hardware.as_mut();
        self.pulses.set_direction(direction, out);
        self.pulses.set_rate(rate);
        self.pulses.enable(out);
        self.motion = motion;
    }

    /// Start driving toward the home reference.
    ///
    /// Clears the homed flag; it is set again once the reference is found.
    pub fn home(&mut self) {
        info!("{} axis homing ({:?})", self.kind, self.config.homing);
        self.homed = false;
        let motion = Motion::Homing {
            method: self.config.homing,
            travelled: 0,
        };
        self.start(motion, Direction::CounterClockwise, self.config.homing_rate);
    }

    /// Start a move to an absolute step position.
    ///
    /// The rotation axis wraps the target into one revolution; the raster
    /// axis fails with `OutOfRange` if the target is outside its travel.
    pub fn move_to(&mut self, target: i64, rate: f64) -> CarouselResult<()> {
        self.check_target(target)?;
        let target = self.wrap(target);
        let direction = Direction::toward(self.position, target);
        debug!(
            "{} axis move {} -> {} at {:.1} steps/s",
            self.kind, self.position, target, rate
        );
        self.start(Motion::MoveTo { target }, direction, rate);
        Ok(())
    }

    /// Start a move by a relative number of steps.
    pub fn move_by(&mut self, delta: i64, rate: f64) -> CarouselResult<()> {
        self.move_to(self.position + delta, rate)
    }

    /// Step indefinitely until [`stop`](Self::stop) is called.
    pub fn run_continuous(&mut self, rate: f64, direction: Direction) {
        debug!(
            "{} axis continuous {} at {:.1} steps/s",
            self.kind, direction, rate
        );
        self.start(Motion::Continuous, direction, rate);
    }

    /// Disable pulse output and abandon any motion. Idempotent.
    ///
    /// Returns `true` once the driver enable line reads back as released.
    pub fn stop(&mut self) -> bool {
        self.pulses.disable(self.hardware.as_mut());
        if self.motion != Motion::Idle {
            debug!("{} axis stopped at {}", self.kind, self.position);
        }
        self.motion = Motion::Idle;
        !self.hardware.read_inputs().driver_enabled
    }

    /// Fault signal still present on the inputs, if its trigger is enabled.
    ///
    /// Stall counts here even with the driver disabled.
    pub fn asserted_fault(&mut self) -> Option<FaultKind> {
        let inputs = self.hardware.read_inputs();
        if inputs.stall && self.triggers.stall {
            Some(FaultKind::Stall)
        } else if inputs.limit_switch && self.triggers.limit_switch {
            Some(FaultKind::LimitSwitch)
        } else {
            None
        }
    }

    fn advance(&mut self) {
        let delta = self.pulses.step(self.hardware.as_mut());
        self.position = self.wrap(self.position + delta);
    }

    fn finish_homing(&mut self) -> AxisEvent {
        self.stop();
        self.position = 0;
        self.homed = true;
        info!("{} axis homed", self.kind);
        AxisEvent::Homed
    }

    fn fault(&mut self, kind: FaultKind) -> AxisEvent {
        self.stop();
        warn!("{} axis fault: {} at {}", self.kind, kind, self.position);
        AxisEvent::Fault(kind)
    }

    /// Advance the current motion by one tick of `dt_secs` seconds.
    pub fn tick(&mut self, dt_secs: f64) -> AxisEvent {
        let inputs = self.hardware.read_inputs();
        let homing = matches!(self.motion, Motion::Homing { .. });

        if inputs.stall && self.triggers.stall && self.pulses.is_enabled() {
            return self.fault(FaultKind::Stall);
        }
        if inputs.limit_switch && self.triggers.limit_switch && !homing {
            return self.fault(FaultKind::LimitSwitch);
        }

        match self.motion {
            Motion::Idle => AxisEvent::Idle,
            Motion::Homing { method, travelled } => {
                self.tick_homing(method, travelled, inputs, dt_secs)
            }
            Motion::MoveTo { target } => {
                let due = self.pulses.begin_tick(dt_secs);
                for _ in 0..due {
                    if self.position == target {
                        break;
                    }
                    self.advance();
                }
                if self.position == target {
                    self.stop();
                    AxisEvent::Completed
                } else {
                    AxisEvent::Moving
                }
            }
            Motion::Continuous => {
                let due = self.pulses.begin_tick(dt_secs);
                for _ in 0..due {
                    self.advance();
                }
                AxisEvent::Moving
            }
        }
    }

    fn tick_homing(
        &mut self,
        method: HomingMethod,
        mut travelled: u64,
        inputs: AxisInputs,
        dt_secs: f64,
    ) -> AxisEvent {
        let due = self.pulses.begin_tick(dt_secs);

        match method {
            HomingMethod::Sensor { max_steps } => {
                if inputs.home_switch {
                    return self.finish_homing();
                }
                for _ in 0..due {
                    if travelled >= max_steps {
                        break;
                    }
                    self.advance();
                    travelled += 1;
                    if self.hardware.read_inputs().home_switch {
                        return self.finish_homing();
                    }
                }
                if travelled >= max_steps {
                    if self.triggers.homing_timeout {
                        return self.fault(FaultKind::HomingTimeout);
                    }
                    warn!(
                        "{} axis home switch not seen after {} steps, zeroing anyway",
                        self.kind, travelled
                    );
                    return self.finish_homing();
                }
            }
            HomingMethod::TimedTravel { steps } => {
                for _ in 0..due {
                    if travelled >= steps {
                        break;
                    }
                    self.advance();
                    travelled += 1;
                }
                if travelled >= steps {
                    return self.finish_homing();
                }
            }
        }

        self.motion = Motion::Homing { method, travelled };
        AxisEvent::Moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedAxis;

    const DT: f64 = 0.001;

    fn rotation_axis(sim: &SimulatedAxis) -> AxisController {
        AxisController::new(
            AxisKind::Rotation,
            AxisConfig::rotation_default(),
            FaultTriggers::default(),
            Box::new(sim.clone()),
        )
    }

    fn raster_axis(sim: &SimulatedAxis) -> AxisController {
        AxisController::new(
            AxisKind::Raster,
            AxisConfig::raster_default(),
            FaultTriggers::default(),
            Box::new(sim.clone()),
        )
    }

    fn run_until_settled(axis: &mut AxisController, max_ticks: usize) -> AxisEvent {
        for _ in 0..max_ticks {
            let event = axis.tick(DT);
            if event != AxisEvent::Moving {
                return event;
            }
        }
        AxisEvent::Moving
    }

    #[test]
    fn test_move_to_reaches_target_exactly() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        axis.move_to(1234, 4000.0).unwrap();

        assert_eq!(run_until_settled(&mut axis, 10_000), AxisEvent::Completed);
        assert_eq!(axis.position(), 1234);
        assert_eq!(sim.physical_position(), 1234);
        assert_eq!(sim.pulse_count(), 1234);
        assert!(!axis.is_enabled());
    }

    #[test]
    fn test_move_to_backwards() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        axis.move_to(500, 4000.0).unwrap();
        run_until_settled(&mut axis, 10_000);

        axis.move_to(200, 4000.0).unwrap();
        assert_eq!(run_until_settled(&mut axis, 10_000), AxisEvent::Completed);
        assert_eq!(axis.position(), 200);
        assert_eq!(sim.physical_position(), 200);
    }

    #[test]
    fn test_raster_out_of_range_is_rejected_without_motion() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        let err = axis.move_to(9000, 1000.0).unwrap_err();
        assert_eq!(
            err,
            CarouselError::OutOfRange {
                target: 9000,
                min: 0,
                max: 8000
            }
        );
        assert!(!axis.is_moving());
        assert_eq!(axis.tick(DT), AxisEvent::Idle);
        assert_eq!(sim.pulse_count(), 0);
    }

    #[test]
    fn test_rotation_wraps_instead_of_failing() {
        let sim = SimulatedAxis::rotation(3200, 0);
        let mut axis = rotation_axis(&sim);
        axis.move_to(3200 + 100, 3200.0).unwrap();
        assert_eq!(axis.target(), Some(100));
        run_until_settled(&mut axis, 10_000);
        assert_eq!(axis.position(), 100);

        axis.move_by(-200, 3200.0).unwrap();
        assert_eq!(axis.target(), Some(3100));
        run_until_settled(&mut axis, 10_000);
        assert_eq!(axis.position(), 3100);
    }

    #[test]
    fn test_position_only_changes_by_emitted_pulses() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        axis.move_to(4000, 1000.0).unwrap();

        // 1000 steps/s for 10 ms = 10 pulses
        for _ in 0..10 {
            axis.tick(DT);
        }
        assert_eq!(axis.position(), 10);
        assert_eq!(sim.pulse_count(), 10);
    }

    #[test]
    fn test_continuous_runs_until_stopped() {
        let sim = SimulatedAxis::rotation(3200, 0);
        let mut axis = rotation_axis(&sim);
        axis.run_continuous(1000.0, Direction::CounterClockwise);
        for _ in 0..100 {
            assert_eq!(axis.tick(DT), AxisEvent::Moving);
        }
        assert_eq!(axis.position(), 3100);

        assert!(axis.stop());
        assert!(axis.stop());
        assert_eq!(axis.tick(DT), AxisEvent::Idle);
        assert_eq!(axis.position(), 3100);
        assert!(!sim.is_enabled());
    }

    #[test]
    fn test_sensor_homing_zeroes_position() {
        let sim = SimulatedAxis::linear(300);
        let mut axis = raster_axis(&sim);
        axis.move_to(1000, 4000.0).unwrap();
        run_until_settled(&mut axis, 10_000);
        // Tracked 1000, physically at 1300
        assert_eq!(sim.physical_position(), 1300);

        axis.home();
        assert!(!axis.is_homed());
        assert_eq!(run_until_settled(&mut axis, 10_000), AxisEvent::Homed);
        assert!(axis.is_homed());
        assert_eq!(axis.position(), 0);
        assert_eq!(sim.physical_position(), 0);
    }

    #[test]
    fn test_homing_when_already_on_switch() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        axis.home();
        assert_eq!(axis.tick(DT), AxisEvent::Homed);
        assert_eq!(sim.pulse_count(), 0);
    }

    #[test]
    fn test_homing_timeout_faults() {
        // Starts behind the switch, so reverse travel never finds it
        let sim = SimulatedAxis::linear(-50);
        let mut config = AxisConfig::raster_default();
        config.homing = HomingMethod::Sensor { max_steps: 100 };
        let mut axis = AxisController::new(
            AxisKind::Raster,
            config,
            FaultTriggers::default(),
            Box::new(sim.clone()),
        );
        axis.home();
        assert_eq!(
            run_until_settled(&mut axis, 1000),
            AxisEvent::Fault(FaultKind::HomingTimeout)
        );
        assert!(!axis.is_homed());
        assert_eq!(sim.pulse_count(), 100);
    }

    #[test]
    fn test_homing_timeout_trigger_disabled_zeroes_anyway() {
        let sim = SimulatedAxis::linear(-50);
        let mut config = AxisConfig::raster_default();
        config.homing = HomingMethod::Sensor { max_steps: 100 };
        let triggers = FaultTriggers {
            homing_timeout: false,
            ..FaultTriggers::default()
        };
        let mut axis =
            AxisController::new(AxisKind::Raster, config, triggers, Box::new(sim.clone()));
        axis.home();
        assert_eq!(run_until_settled(&mut axis, 1000), AxisEvent::Homed);
        assert_eq!(axis.position(), 0);
    }

    #[test]
    fn test_timed_travel_homing() {
        let sim = SimulatedAxis::linear(0);
        let mut config = AxisConfig::raster_default();
        config.homing = HomingMethod::TimedTravel { steps: 250 };
        let mut axis = AxisController::new(
            AxisKind::Raster,
            config,
            FaultTriggers::default(),
            Box::new(sim.clone()),
        );
        axis.home();
        assert_eq!(run_until_settled(&mut axis, 1000), AxisEvent::Homed);
        assert_eq!(sim.pulse_count(), 250);
        assert_eq!(axis.position(), 0);
    }

    #[test]
    fn test_stall_faults_moving_axis() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        axis.move_to(4000, 1000.0).unwrap();
        axis.tick(DT);
        sim.inject_stall(true);
        assert_eq!(axis.tick(DT), AxisEvent::Fault(FaultKind::Stall));
        assert!(!axis.is_moving());
        assert!(!sim.is_enabled());
    }

    #[test]
    fn test_limit_switch_trigger_can_be_disabled() {
        let sim = SimulatedAxis::linear(0);
        let triggers = FaultTriggers {
            limit_switch: false,
            ..FaultTriggers::default()
        };
        let mut axis = AxisController::new(
            AxisKind::Raster,
            AxisConfig::raster_default(),
            triggers,
            Box::new(sim.clone()),
        );
        sim.inject_limit(true);
        axis.move_to(10, 1000.0).unwrap();
        assert_eq!(run_until_settled(&mut axis, 100), AxisEvent::Completed);
    }

    #[test]
    fn test_stop_reports_enable_readback() {
        let sim = SimulatedAxis::rotation(3200, 0);
        let mut axis = rotation_axis(&sim);
        axis.run_continuous(1000.0, Direction::Clockwise);
        sim.inject_stuck_enable(true);
        assert!(!axis.stop());
        assert!(sim.is_enabled());

        sim.inject_stuck_enable(false);
        assert!(axis.stop());
        assert!(!sim.is_enabled());
    }

    #[test]
    fn test_asserted_fault_follows_triggers() {
        let sim = SimulatedAxis::linear(0);
        let mut axis = raster_axis(&sim);
        assert_eq!(axis.asserted_fault(), None);

        // Stall counts even with the driver off
        sim.inject_stall(true);
        assert_eq!(axis.asserted_fault(), Some(FaultKind::Stall));
        sim.inject_stall(false);

        sim.inject_limit(true);
        assert_eq!(axis.asserted_fault(), Some(FaultKind::LimitSwitch));

        let triggers = FaultTriggers {
            limit_switch: false,
            ..FaultTriggers::default()
        };
        let mut relaxed = AxisController::new(
            AxisKind::Raster,
            AxisConfig::raster_default(),
            triggers,
            Box::new(sim.clone()),
        );
        assert_eq!(relaxed.asserted_fault(), None);
    }
}
