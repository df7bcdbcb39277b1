//! Carousel state machine.
//!
//! Owns both axes and the operating mode. Every mode change goes through
//! [`Carousel::transition`], which checks it against the legal transition
//! table and latches Fault if something tries to take an illegal path.
//!
//! ```text
//!            home            both axes homed
//!   Idle ─────────────► Homing ───────────────► Idle
//!   Idle ── rotate ───► Rotating ── done ─────► Idle
//!   Idle ── raster ───► Rastering ── done ────► Idle
//!   Idle ── spin ─────► ContinuousRotation ── stop ──► Idle
//!   any  ── axis fault ──► Fault ── reset ──► Idle
//! ```
//!
//! While any motion is in progress, new motion commands are rejected with
//! `Busy`; only `stop` and status queries get through.

use std::time::Duration;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::axis::{AxisController, AxisEvent, AxisHardware, AxisKind};
use crate::config::CarouselConfig;
use crate::error::{CarouselError, CarouselResult, FaultKind};
use crate::pulse::Direction;
use crate::raster::RasterPlan;
use crate::status::{MotorEnable, StatusSnapshot};

/// Carousel operating mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Waiting for a command
    Idle,
    /// Both axes seeking their home reference
    Homing,
    /// Rotation axis moving to an angle
    Rotating,
    /// Raster axis stepping through a raster plan
    Rastering,
    /// Rotation axis spinning until stopped
    ContinuousRotation,
    /// Latched fault, Reset required
    Fault,
}

impl Mode {
    /// Whether a motion is in progress.
    pub fn is_moving(self) -> bool {
        matches!(
            self,
            Mode::Homing | Mode::Rotating | Mode::Rastering | Mode::ContinuousRotation
        )
    }

    /// Legal transition table.
    pub fn can_transition_to(self, next: Mode) -> bool {
        match (self, next) {
            (_, Mode::Fault) => true,
            (from, to) if from == to => true,
            (Mode::Idle, _) => true,
            (from, Mode::Idle) => from.is_moving() || from == Mode::Fault,
            _ => false,
        }
    }
}

/// The carousel: two axes plus the mode that coordinates them.
pub struct Carousel {
    config: CarouselConfig,
    mode: Mode,
    fault: Option<FaultKind>,
    rotation: AxisController,
    raster: AxisController,
    raster_plan: Option<RasterPlan>,
}

impl Carousel {
    /// Build a carousel in Idle with unhomed axes.
    pub fn new(
        config: CarouselConfig,
        rotation_hw: Box<dyn AxisHardware>,
        raster_hw: Box<dyn AxisHardware>,
    ) -> Self {
        let rotation = AxisController::new(
            AxisKind::Rotation,
            config.rotation.clone(),
            config.fault_triggers,
            rotation_hw,
        );
        let raster = AxisController::new(
            AxisKind::Raster,
            config.raster.clone(),
            config.fault_triggers,
            raster_hw,
        );
        Self {
            config,
            mode: Mode::Idle,
            fault: None,
            rotation,
            raster,
            raster_plan: None,
        }
    }

    /// Active mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Latched fault cause, if in Fault.
    pub fn fault(&self) -> Option<FaultKind> {
        self.fault
    }

    /// Whether both axes have been homed.
    pub fn is_homed(&self) -> bool {
        self.rotation.is_homed() && self.raster.is_homed()
    }

    /// Rotation axis.
    pub fn rotation_axis(&self) -> &AxisController {
        &self.rotation
    }

    /// Raster axis.
    pub fn raster_axis(&self) -> &AxisController {
        &self.raster
    }

    /// Active raster plan, if rastering.
    pub fn raster_plan(&self) -> Option<&RasterPlan> {
        self.raster_plan.as_ref()
    }

    /// Session configuration.
    pub fn config(&self) -> &CarouselConfig {
        &self.config
    }

    /// Convert a rotation angle in degrees to absolute steps (unwrapped).
    pub fn degrees_to_steps(&self, angle: f64) -> i64 {
        let spr = f64::from(self.config.rotation.steps_per_revolution);
        (angle * spr / 360.0).round() as i64
    }

    fn rotation_rate(&self, degrees_per_second: f64) -> f64 {
        degrees_per_second * f64::from(self.config.rotation.steps_per_revolution) / 360.0
    }

    fn transition(&mut self, next: Mode) {
        if next == self.mode {
            return;
        }
        if !self.mode.can_transition_to(next) {
            warn!("Illegal transition {} -> {}", self.mode, next);
            self.enter_fault(FaultKind::InternalState);
            return;
        }
        info!("Carousel {} -> {}", self.mode, next);
        self.mode = next;
    }

    fn fault_error(&self) -> CarouselError {
        CarouselError::Fault(self.fault.unwrap_or(FaultKind::InternalState))
    }

    fn ensure_idle(&self) -> CarouselResult<()> {
        match self.mode {
            Mode::Idle => Ok(()),
            Mode::Fault => Err(self.fault_error()),
            _ => Err(CarouselError::Busy),
        }
    }

    fn ensure_can_move(&self) -> CarouselResult<()> {
        self.ensure_idle()?;
        if self.config.require_homing && !self.is_homed() {
            return Err(CarouselError::NotHomed);
        }
        Ok(())
    }

    /// Home both axes.
    pub fn home(&mut self) -> CarouselResult<()> {
        self.ensure_idle()?;
        self.rotation.home();
        self.raster.home();
        self.transition(Mode::Homing);
        Ok(())
    }

    /// Rotate to an absolute angle (degrees) at `speed` degrees/second.
    pub fn rotate(&mut self, angle: f64, speed: f64) -> CarouselResult<()> {
        self.ensure_can_move()?;
        let target = self.degrees_to_steps(angle);
        let rate = self.rotation_rate(speed);
        self.rotation.move_to(target, rate)?;
        self.transition(Mode::Rotating);
        Ok(())
    }

    /// Rotate to a configured target preset.
    pub fn rotate_to_target(&mut self, index: usize, speed: f64) -> CarouselResult<()> {
        self.ensure_can_move()?;
        let angle = self.config.target_angles.get(index).copied().ok_or(
            CarouselError::OutOfRange {
                target: index as i64,
                min: 0,
                max: self.config.target_angles.len() as i64 - 1,
            },
        )?;
        debug!("Target {} at {} deg", index, angle);
        self.rotate(angle, speed)
    }

    /// Raster `count` evenly spaced positions from `start` to `end` at
    /// `speed` steps/second.
    ///
    /// Every position is checked against the raster travel before anything
    /// moves.
    pub fn raster(&mut self, start: i64, end: i64, count: u32, speed: f64) -> CarouselResult<()> {
        self.ensure_can_move()?;
        let plan = RasterPlan::new(start, end, count, speed);
        for &position in plan.positions() {
            self.raster.check_target(position)?;
        }
        self.begin_raster(plan)
    }

    /// Move the raster axis by `steps` in `direction` at `speed` steps/second.
    pub fn jog(&mut self, direction: Direction, steps: u32, speed: f64) -> CarouselResult<()> {
        self.ensure_can_move()?;
        let target = self.raster.position() + direction.sign() * i64::from(steps);
        self.raster.check_target(target)?;
        self.begin_raster(RasterPlan::single(target, speed))
    }

    fn begin_raster(&mut self, mut plan: RasterPlan) -> CarouselResult<()> {
        let Some(first) = plan.next_target() else {
            return Err(CarouselError::InvalidCommand(
                "raster plan has no positions".to_string(),
            ));
        };
        self.raster.move_to(first, plan.speed())?;
        if self.config.raster_rotation_speed > 0.0 {
            let rate = self.rotation_rate(self.config.raster_rotation_speed);
            self.rotation.run_continuous(rate, Direction::Clockwise);
        }
        self.raster_plan = Some(plan);
        self.transition(Mode::Rastering);
        Ok(())
    }

    /// Spin the rotation axis at `speed` degrees/second until stopped.
    pub fn spin(&mut self, speed: f64, direction: Direction) -> CarouselResult<()> {
        self.ensure_can_move()?;
        let rate = self.rotation_rate(speed);
        self.rotation.run_continuous(rate, direction);
        self.transition(Mode::ContinuousRotation);
        Ok(())
    }

    fn stop_axes(&mut self) -> bool {
        let rotation_stopped = self.rotation.stop();
        let raster_stopped = self.raster.stop();
        self.raster_plan = None;
        rotation_stopped && raster_stopped
    }

    /// Stop all motion. Accepted in every mode; a no-op when Idle.
    ///
    /// Stopping during Homing abandons it, leaving the axes unhomed. Fault
    /// stays latched.
    pub fn stop(&mut self) {
        self.stop_axes();
        if self.mode.is_moving() {
            info!("Stop requested in {}", self.mode);
            self.transition(Mode::Idle);
        }
    }

    /// Clear a latched fault.
    ///
    /// Only leaves Fault once both drivers read back as disabled and no
    /// enabled fault signal is still asserted. Axes must be homed again
    /// afterwards since steps may have been lost.
    pub fn reset(&mut self) -> CarouselResult<()> {
        match self.mode {
            Mode::Idle => Ok(()),
            Mode::Fault => {
                if !self.stop_axes() {
                    warn!("Reset refused: axes did not confirm stop");
                    return Err(self.fault_error());
                }
                for axis in [&mut self.rotation, &mut self.raster] {
                    if let Some(kind) = axis.asserted_fault() {
                        warn!(
                            "Reset refused: {} still asserted on {} axis",
                            kind,
                            axis.kind()
                        );
                        return Err(CarouselError::Fault(kind));
                    }
                }
                self.rotation.clear_homed();
                self.raster.clear_homed();
                self.fault = None;
                self.transition(Mode::Idle);
                Ok(())
            }
            _ => Err(CarouselError::Busy),
        }
    }

    /// Latch Fault from any mode, stopping both axes.
    pub fn enter_fault(&mut self, kind: FaultKind) {
        self.stop_axes();
        if self.fault.is_none() {
            warn!("Carousel fault in {}: {}", self.mode, kind);
            self.fault = Some(kind);
        }
        self.mode = Mode::Fault;
    }

    /// Stop everything and fall back to Idle (or stay in Fault).
    ///
    /// Used when the host link goes away.
    pub fn shutdown(&mut self) {
        self.stop_axes();
        if self.mode.is_moving() {
            self.transition(Mode::Idle);
        }
        info!("Carousel shut down in {}", self.mode);
    }

    /// Advance both axes by one tick and handle motion completion.
    pub fn tick(&mut self, dt: Duration) {
        let dt_secs = dt.as_secs_f64();
        let rotation_event = self.rotation.tick(dt_secs);
        let raster_event = self.raster.tick(dt_secs);

        for event in [rotation_event, raster_event] {
            if let AxisEvent::Fault(kind) = event {
                self.enter_fault(kind);
                return;
            }
        }

        match self.mode {
            Mode::Idle | Mode::Fault | Mode::ContinuousRotation => {}
            Mode::Homing => {
                if self.is_homed() {
                    self.transition(Mode::Idle);
                }
            }
            Mode::Rotating => {
                if !self.rotation.is_moving() {
                    self.transition(Mode::Idle);
                }
            }
            Mode::Rastering => {
                if raster_event == AxisEvent::Completed || !self.raster.is_moving() {
                    self.advance_raster();
                }
            }
        }
    }

    fn advance_raster(&mut self) {
        let Some(plan) = self.raster_plan.as_mut() else {
            self.enter_fault(FaultKind::InternalState);
            return;
        };
        let speed = plan.speed();
        match plan.next_target() {
            Some(target) => {
                debug!("Raster move {} -> {}", plan.issued(), target);
                if self.raster.move_to(target, speed).is_err() {
                    self.enter_fault(FaultKind::InternalState);
                }
            }
            None => {
                self.stop_axes();
                self.transition(Mode::Idle);
            }
        }
    }

    /// Current status.
    pub fn status(&self) -> StatusSnapshot {
        let mut motors = MotorEnable::empty();
        motors.set(MotorEnable::ROTATION, self.rotation.is_enabled());
        motors.set(MotorEnable::RASTER, self.raster.is_enabled());
        StatusSnapshot {
            mode: self.mode,
            rotation_position: self.rotation.position(),
            raster_position: self.raster.position(),
            motors,
            fault: self.mode == Mode::Fault,
            homed: self.is_homed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedPlant;
    use strum::IntoEnumIterator;

    const DT: Duration = Duration::from_millis(1);

    fn carousel_at(rotation_start: i64, raster_start: i64) -> (Carousel, SimulatedPlant) {
        let config = CarouselConfig::default();
        let plant = SimulatedPlant::new(&config, rotation_start, raster_start);
        let carousel = Carousel::new(
            config,
            Box::new(plant.rotation.clone()),
            Box::new(plant.raster.clone()),
        );
        (carousel, plant)
    }

    fn run_until_idle(carousel: &mut Carousel, max_ticks: usize) -> usize {
        for n in 0..max_ticks {
            if !carousel.mode().is_moving() {
                return n;
            }
            carousel.tick(DT);
        }
        panic!("still {} after {} ticks", carousel.mode(), max_ticks);
    }

    fn homed_carousel() -> (Carousel, SimulatedPlant) {
        let (mut carousel, plant) = carousel_at(1000, 500);
        carousel.home().unwrap();
        run_until_idle(&mut carousel, 20_000);
        assert!(carousel.is_homed());
        (carousel, plant)
    }

    #[test]
    fn test_transition_table() {
        for mode in Mode::iter() {
            assert!(mode.can_transition_to(Mode::Fault));
            assert!(Mode::Idle.can_transition_to(mode));
        }
        assert!(Mode::Rotating.can_transition_to(Mode::Idle));
        assert!(Mode::Fault.can_transition_to(Mode::Idle));
        assert!(!Mode::Rotating.can_transition_to(Mode::Rastering));
        assert!(!Mode::Fault.can_transition_to(Mode::Rotating));
        assert!(!Mode::Homing.can_transition_to(Mode::ContinuousRotation));
    }

    #[test]
    fn test_home_from_any_start_ends_at_zero() {
        for (rotation_start, raster_start) in [(0, 0), (1, 1), (3199, 7000), (1600, 250)] {
            let (mut carousel, plant) = carousel_at(rotation_start, raster_start);
            carousel.home().unwrap();
            assert_eq!(carousel.mode(), Mode::Homing);
            run_until_idle(&mut carousel, 20_000);

            assert_eq!(carousel.mode(), Mode::Idle);
            assert_eq!(carousel.rotation_axis().position(), 0);
            assert_eq!(carousel.raster_axis().position(), 0);
            assert_eq!(plant.rotation.physical_position(), 0);
            assert_eq!(plant.raster.physical_position(), 0);
        }
    }

    #[test]
    fn test_motion_requires_homing() {
        let (mut carousel, _plant) = carousel_at(0, 0);
        assert_eq!(carousel.rotate(90.0, 10.0), Err(CarouselError::NotHomed));
        assert_eq!(
            carousel.spin(10.0, Direction::Clockwise),
            Err(CarouselError::NotHomed)
        );
        assert_eq!(carousel.mode(), Mode::Idle);
    }

    #[test]
    fn test_rotate_wrap_invariant() {
        let (mut carousel, _plant) = homed_carousel();
        for angle in [0.0, 45.0, 90.5, 180.0, 359.9, 360.0, 14.0] {
            carousel.rotate(angle, 360.0).unwrap();
            assert_eq!(carousel.mode(), Mode::Rotating);
            run_until_idle(&mut carousel, 20_000);
            let expected = ((angle * 3200.0 / 360.0_f64).round() as i64).rem_euclid(3200);
            assert_eq!(carousel.rotation_axis().position(), expected, "angle {angle}");
        }
    }

    #[test]
    fn test_motion_while_busy_is_rejected() {
        let (mut carousel, _plant) = homed_carousel();
        carousel.rotate(180.0, 10.0).unwrap();
        carousel.tick(DT);
        let rotation = carousel.rotation_axis().position();
        let raster = carousel.raster_axis().position();

        assert_eq!(carousel.rotate(90.0, 10.0), Err(CarouselError::Busy));
        assert_eq!(carousel.raster(0, 100, 2, 10.0), Err(CarouselError::Busy));
        assert_eq!(
            carousel.spin(10.0, Direction::Clockwise),
            Err(CarouselError::Busy)
        );
        assert_eq!(carousel.home(), Err(CarouselError::Busy));
        assert_eq!(carousel.reset(), Err(CarouselError::Busy));
        assert_eq!(carousel.mode(), Mode::Rotating);
        assert_eq!(carousel.rotation_axis().position(), rotation);
        assert_eq!(carousel.raster_axis().position(), raster);
        assert_eq!(carousel.rotation_axis().target(), Some(1600));
    }

    #[test]
    fn test_raster_visits_each_position_in_turn() {
        let (mut carousel, _plant) = homed_carousel();
        carousel.raster(0, 1000, 5, 200.0).unwrap();
        assert_eq!(carousel.mode(), Mode::Rastering);

        let mut targets = Vec::new();
        for _ in 0..20_000 {
            if let Some(target) = carousel.raster_axis().target() {
                if targets.last() != Some(&target) {
                    // The previous move must have finished before a new one starts
                    if let Some(&previous) = targets.last() {
                        assert_eq!(carousel.raster_axis().position(), previous);
                    }
                    targets.push(target);
                }
            }
            if !carousel.mode().is_moving() {
                break;
            }
            carousel.tick(DT);
        }

        assert_eq!(targets, vec![0, 250, 500, 750, 1000]);
        assert_eq!(carousel.mode(), Mode::Idle);
        assert_eq!(carousel.raster_axis().position(), 1000);
    }

    #[test]
    fn test_raster_beyond_travel_is_rejected() {
        let (mut carousel, _plant) = homed_carousel();
        let err = carousel.raster(0, 9000, 3, 100.0).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::OutOfRange);
        assert_eq!(carousel.mode(), Mode::Idle);
        assert!(carousel.raster_plan().is_none());
    }

    #[test]
    fn test_raster_spins_rotation_when_configured() {
        let mut config = CarouselConfig::default();
        config.raster_rotation_speed = 90.0;
        config.require_homing = false;
        let plant = SimulatedPlant::new(&config, 0, 0);
        let mut carousel = Carousel::new(
            config,
            Box::new(plant.rotation.clone()),
            Box::new(plant.raster.clone()),
        );

        carousel.raster(0, 400, 2, 4000.0).unwrap();
        carousel.tick(DT);
        assert!(carousel.rotation_axis().is_moving());
        run_until_idle(&mut carousel, 10_000);
        assert!(!carousel.rotation_axis().is_moving());
        assert!(carousel.rotation_axis().position() > 0);
    }

    #[test]
    fn test_jog_moves_relative_and_checks_travel() {
        let (mut carousel, _plant) = homed_carousel();
        carousel.jog(Direction::Clockwise, 40, 1000.0).unwrap();
        run_until_idle(&mut carousel, 1000);
        assert_eq!(carousel.raster_axis().position(), 40);

        assert!(matches!(
            carousel.jog(Direction::CounterClockwise, 41, 1000.0),
            Err(CarouselError::OutOfRange { target: -1, .. })
        ));
    }

    #[test]
    fn test_rotate_to_target_preset() {
        let (mut carousel, _plant) = homed_carousel();
        carousel.rotate_to_target(2, 360.0).unwrap();
        run_until_idle(&mut carousel, 10_000);
        assert_eq!(carousel.rotation_axis().position(), carousel.degrees_to_steps(74.0));

        assert!(matches!(
            carousel.rotate_to_target(7, 10.0),
            Err(CarouselError::OutOfRange { target: 7, min: 0, max: 6 })
        ));
    }

    #[test]
    fn test_stop_halts_continuous_rotation_immediately() {
        let (mut carousel, plant) = homed_carousel();
        carousel.spin(90.0, Direction::CounterClockwise).unwrap();
        for _ in 0..50 {
            carousel.tick(DT);
        }
        assert_eq!(carousel.mode(), Mode::ContinuousRotation);

        carousel.stop();
        assert_eq!(carousel.mode(), Mode::Idle);
        let pulses = plant.rotation.pulse_count();
        carousel.tick(DT);
        assert_eq!(plant.rotation.pulse_count(), pulses);
        assert!(carousel.status().motors.is_empty());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut carousel, _plant) = homed_carousel();
        let before = carousel.status();
        carousel.stop();
        assert_eq!(carousel.status(), before);
    }

    #[test]
    fn test_stop_during_homing_leaves_unhomed() {
        let (mut carousel, _plant) = carousel_at(1000, 1000);
        carousel.home().unwrap();
        carousel.tick(DT);
        carousel.stop();
        assert_eq!(carousel.mode(), Mode::Idle);
        assert!(!carousel.is_homed());
    }

    #[test]
    fn test_fault_during_rotation_latches_until_reset() {
        let (mut carousel, plant) = homed_carousel();
        carousel.rotate(270.0, 30.0).unwrap();
        carousel.tick(DT);

        plant.rotation.inject_stall(true);
        carousel.tick(DT);
        assert_eq!(carousel.mode(), Mode::Fault);
        assert_eq!(carousel.fault(), Some(FaultKind::Stall));
        assert!(carousel.status().fault);
        assert!(!plant.rotation.is_enabled());

        assert_eq!(
            carousel.rotate(10.0, 10.0),
            Err(CarouselError::Fault(FaultKind::Stall))
        );
        assert_eq!(carousel.home(), Err(CarouselError::Fault(FaultKind::Stall)));

        // Stop is accepted but the fault stays latched
        carousel.stop();
        carousel.tick(DT);
        assert_eq!(carousel.mode(), Mode::Fault);

        plant.rotation.inject_stall(false);
        carousel.reset().unwrap();
        assert_eq!(carousel.mode(), Mode::Idle);
        assert_eq!(carousel.fault(), None);
        assert!(!carousel.is_homed());
    }

    #[test]
    fn test_reset_refused_while_limit_held() {
        let (mut carousel, plant) = homed_carousel();
        plant.raster.inject_limit(true);
        carousel.tick(DT);
        assert_eq!(carousel.mode(), Mode::Fault);

        assert_eq!(
            carousel.reset(),
            Err(CarouselError::Fault(FaultKind::LimitSwitch))
        );
        assert_eq!(carousel.mode(), Mode::Fault);
        carousel.tick(DT);
        assert_eq!(carousel.mode(), Mode::Fault);

        plant.raster.inject_limit(false);
        carousel.reset().unwrap();
        carousel.tick(DT);
        assert_eq!(carousel.mode(), Mode::Idle);
    }

    #[test]
    fn test_reset_refused_while_stall_held() {
        let (mut carousel, plant) = homed_carousel();
        carousel.spin(90.0, Direction::Clockwise).unwrap();
        plant.rotation.inject_stall(true);
        carousel.tick(DT);
        assert_eq!(carousel.mode(), Mode::Fault);

        assert_eq!(carousel.reset(), Err(CarouselError::Fault(FaultKind::Stall)));
        plant.rotation.inject_stall(false);
        assert_eq!(carousel.reset(), Ok(()));
    }

    #[test]
    fn test_reset_refused_while_driver_stays_enabled() {
        let (mut carousel, plant) = homed_carousel();
        carousel.spin(90.0, Direction::Clockwise).unwrap();
        carousel.tick(DT);
        plant.rotation.inject_stuck_enable(true);
        carousel.enter_fault(FaultKind::Stall);
        assert!(plant.rotation.is_enabled());

        assert_eq!(carousel.reset(), Err(CarouselError::Fault(FaultKind::Stall)));
        assert_eq!(carousel.mode(), Mode::Fault);

        plant.rotation.inject_stuck_enable(false);
        carousel.reset().unwrap();
        assert_eq!(carousel.mode(), Mode::Idle);
        assert!(!plant.rotation.is_enabled());
    }

    #[test]
    fn test_illegal_transition_latches_internal_fault() {
        let (mut carousel, _plant) = homed_carousel();
        carousel.spin(10.0, Direction::Clockwise).unwrap();
        carousel.transition(Mode::Rotating);
        assert_eq!(carousel.mode(), Mode::Fault);
        assert_eq!(carousel.fault(), Some(FaultKind::InternalState));
    }

    #[test]
    fn test_shutdown_disables_motors() {
        let (mut carousel, plant) = homed_carousel();
        carousel.spin(90.0, Direction::Clockwise).unwrap();
        carousel.tick(DT);
        carousel.shutdown();
        assert_eq!(carousel.mode(), Mode::Idle);
        assert!(!plant.rotation.is_enabled());
        assert!(!plant.raster.is_enabled());
    }
}
