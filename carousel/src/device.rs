//! Cooperative tick loop of the carousel firmware.
//!
//! Each tick services at most one inbound frame, then advances both axes.
//! Bytes arrive through [`Device::receive`] from whatever transport the
//! caller owns; responses come back as the return value of
//! [`Device::tick`] ready to be written out.

use std::time::Duration;

use tracing::{debug, info};

use crate::axis::AxisHardware;
use crate::config::CarouselConfig;
use crate::handler::CommandHandler;
use crate::protocol::{encode_frame, FrameDecoder};
use crate::sim::SimulatedPlant;
use crate::state_machine::Carousel;
use crate::status::StatusSnapshot;

/// Carousel controller with its inbound frame buffer.
pub struct Device {
    handler: CommandHandler,
    decoder: FrameDecoder,
    ticks: u64,
}

impl Device {
    /// Build a device around two axis back ends.
    pub fn new(
        config: CarouselConfig,
        rotation_hw: Box<dyn AxisHardware>,
        raster_hw: Box<dyn AxisHardware>,
    ) -> Self {
        Self::from_carousel(Carousel::new(config, rotation_hw, raster_hw))
    }

    /// Wrap an existing carousel.
    pub fn from_carousel(carousel: Carousel) -> Self {
        Self {
            handler: CommandHandler::new(carousel),
            decoder: FrameDecoder::new(),
            ticks: 0,
        }
    }

    /// Device driving a simulated plant with both axes at zero.
    pub fn simulated(config: CarouselConfig) -> Self {
        let plant = SimulatedPlant::new(&config, 0, 0);
        Self::with_plant(config, &plant)
    }

    /// Device driving an existing simulated plant.
    ///
    /// The plant handles stay shared, so tests can inject faults or move the
    /// mechanism while the device runs.
    pub fn with_plant(config: CarouselConfig, plant: &SimulatedPlant) -> Self {
        Self::new(
            config,
            Box::new(plant.rotation.clone()),
            Box::new(plant.raster.clone()),
        )
    }

    /// Queue bytes received from the host.
    pub fn receive(&mut self, bytes: &[u8]) {
        self.decoder.push(bytes);
    }

    /// Run one tick of `dt`.
    ///
    /// Returns the encoded response to the frame serviced this tick, or an
    /// empty buffer if no complete frame was waiting.
    pub fn tick(&mut self, dt: Duration) -> Vec<u8> {
        self.ticks += 1;
        let reply = match self.decoder.next_frame() {
            Some(frame) => {
                let response = self.handler.handle_frame(frame);
                let payload = response.to_payload();
                debug!("Tick {}: -> {}", self.ticks, payload);
                encode_frame(&payload)
            }
            None => Vec::new(),
        };
        self.handler.carousel_mut().tick(dt);
        reply
    }

    /// Host link lost: stop motion and drop anything half received.
    pub fn disconnect(&mut self) {
        info!("Host disconnected after {} ticks", self.ticks);
        self.decoder.clear();
        self.handler.carousel_mut().shutdown();
    }

    /// Current status snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.handler.carousel().status()
    }

    /// The underlying carousel.
    pub fn carousel(&self) -> &Carousel {
        self.handler.carousel()
    }

    /// Configured tick period.
    pub fn tick_period(&self) -> Duration {
        self.handler.carousel().config().tick_period()
    }

    /// Complete frames still waiting to be serviced.
    pub fn pending_frames(&self) -> usize {
        self.decoder.pending()
    }

    /// Ticks run since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, FaultKind};
    use crate::protocol::{decode_frame, Command, Response};
    use crate::pulse::Direction;
    use crate::state_machine::Mode;

    const DT: Duration = Duration::from_millis(1);

    fn response(bytes: &[u8]) -> Response {
        let line = bytes.strip_suffix(b"\n").unwrap();
        Response::parse(&decode_frame(line).unwrap()).unwrap()
    }

    fn send(device: &mut Device, command: Command) -> Response {
        device.receive(&encode_frame(&command.to_payload()));
        response(&device.tick(DT))
    }

    fn settle(device: &mut Device) {
        for _ in 0..50_000 {
            if !device.status().mode.is_moving() {
                return;
            }
            device.tick(DT);
        }
        panic!("device never settled");
    }

    #[test]
    fn test_one_frame_per_tick() {
        let mut device = Device::simulated(CarouselConfig::default());
        let mut bytes = encode_frame("STATUS");
        bytes.extend(encode_frame("STOP"));
        device.receive(&bytes);

        assert!(matches!(response(&device.tick(DT)), Response::Status(_)));
        assert_eq!(device.pending_frames(), 1);
        assert_eq!(response(&device.tick(DT)), Response::Ack);
        assert!(device.tick(DT).is_empty());
        assert_eq!(device.ticks(), 3);
    }

    #[test]
    fn test_corrupt_frame_gets_invalid_command() {
        let mut device = Device::simulated(CarouselConfig::default());
        device.receive(b"HOME*12\n");
        let reply = device.tick(DT);
        assert_eq!(
            response(&reply),
            Response::Error(ErrorCode::InvalidCommand)
        );
        assert_eq!(device.status().mode, Mode::Idle);
    }

    #[test]
    fn test_home_then_rotate() {
        let plant = SimulatedPlant::new(&CarouselConfig::default(), 500, 300);
        let mut device = Device::with_plant(CarouselConfig::default(), &plant);

        assert_eq!(send(&mut device, Command::Home), Response::Ack);
        settle(&mut device);
        assert!(device.status().homed);
        assert_eq!(plant.rotation.physical_position(), 0);

        let rotate = Command::Rotate {
            angle: 90.0,
            speed: 90.0,
        };
        assert_eq!(send(&mut device, rotate), Response::Ack);
        settle(&mut device);
        assert_eq!(device.status().rotation_position, 800);
    }

    #[test]
    fn test_fault_reported_in_status() {
        let plant = SimulatedPlant::new(&CarouselConfig::default(), 0, 0);
        let mut device = Device::with_plant(CarouselConfig::default(), &plant);
        send(&mut device, Command::Home);
        settle(&mut device);

        let spin = Command::Spin {
            speed: 45.0,
            direction: Direction::Clockwise,
        };
        assert_eq!(send(&mut device, spin), Response::Ack);
        plant.rotation.inject_stall(true);
        device.tick(DT);

        match send(&mut device, Command::StatusQuery) {
            Response::Status(status) => {
                assert_eq!(status.mode, Mode::Fault);
                assert!(status.fault);
                assert!(status.motors.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(device.carousel().fault(), Some(FaultKind::Stall));
        assert_eq!(send(&mut device, spin), Response::Error(ErrorCode::Fault));

        plant.rotation.inject_stall(false);
        assert_eq!(send(&mut device, Command::Reset), Response::Ack);
        assert_eq!(device.status().mode, Mode::Idle);
        assert!(!device.status().homed);
    }

    #[test]
    fn test_disconnect_stops_motion() {
        let plant = SimulatedPlant::new(&CarouselConfig::default(), 0, 0);
        let mut device = Device::with_plant(CarouselConfig::default(), &plant);
        send(&mut device, Command::Home);
        settle(&mut device);
        send(
            &mut device,
            Command::Spin {
                speed: 90.0,
                direction: Direction::CounterClockwise,
            },
        );
        device.receive(b"STA");

        device.disconnect();
        assert_eq!(device.status().mode, Mode::Idle);
        assert!(!plant.rotation.is_enabled());
        device.receive(&encode_frame("STATUS"));
        assert!(matches!(response(&device.tick(DT)), Response::Status(_)));
    }
}
