//! Host-side carousel driver.
//!
//! Synchronous request/response over any [`Transport`]: every call discards
//! stale input, writes one command frame and blocks until the response frame
//! arrives or the response timeout elapses. The device is the
//! state of record; the driver only caches the last status it successfully
//! read, and a failed exchange never touches that cache.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use ::carousel::protocol::{
    encode_frame, Command, FrameDecoder, FrameError, Response, MAX_RASTER_SPEED,
    MAX_ROTATION_SPEED,
};
use ::carousel::{Direction, ErrorCode, Mode, StatusSnapshot};
use serialport::SerialPort;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::config::HostConfig;
use super::loopback::LoopbackTransport;
use super::transport::{self, Transport};

/// Errors that can occur while driving the carousel.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Low-level I/O error on the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not open or keep the link to the carousel.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No response frame within the response timeout.
    #[error("Timeout waiting for response")]
    CommunicationTimeout,

    /// Motion did not finish within the wait deadline.
    #[error("Carousel still moving after {0:?}")]
    WaitTimeout(Duration),

    /// Response frame was corrupt or unparseable.
    #[error("Protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// Carousel rejected the command.
    #[error("Carousel rejected command: {0}")]
    Device(ErrorCode),

    /// Response was well formed but not what the command expects.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Argument refused before anything was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Host configuration could not be used.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Host driver for the target carousel.
pub struct CarouselDriver<T: Transport> {
    transport: T,
    decoder: FrameDecoder,
    timeout: Duration,
    poll_interval: Duration,
    rotation_speed: f64,
    raster_speed: f64,
    jog_steps: u32,
    last_status: Option<StatusSnapshot>,
    last_target: Option<u8>,
}

impl CarouselDriver<Box<dyn SerialPort>> {
    /// Open the serial port named in `config`.
    pub fn open_serial(config: &HostConfig) -> DriverResult<Self> {
        config.validate()?;
        let port =
            transport::open_serial(&config.port, config.baud_rate, config.response_timeout())?;
        Ok(Self::new(port, config))
    }
}

impl CarouselDriver<std::net::TcpStream> {
    /// Connect to a `mock_carousel` instance.
    pub fn connect_tcp(addr: &str, config: &HostConfig) -> DriverResult<Self> {
        config.validate()?;
        let stream = transport::connect_tcp(addr, config.response_timeout())?;
        Ok(Self::new(stream, config))
    }
}

impl CarouselDriver<LoopbackTransport> {
    /// Drive an in-process simulated carousel.
    pub fn simulated(device_config: ::carousel::CarouselConfig, config: &HostConfig) -> Self {
        Self::new(LoopbackTransport::new(device_config), config)
    }
}

impl<T: Transport> CarouselDriver<T> {
    /// Wrap an already open transport.
    ///
    /// The transport's own read timeout should not exceed the configured
    /// response timeout.
    pub fn new(transport: T, config: &HostConfig) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::new(),
            timeout: config.response_timeout(),
            poll_interval: config.poll_interval(),
            rotation_speed: config.rotation_speed,
            raster_speed: config.raster_speed,
            jog_steps: config.jog_steps,
            last_status: None,
            last_target: None,
        }
    }

    /// Set the response timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Status from the last successful `STATUS` exchange.
    pub fn last_status(&self) -> Option<StatusSnapshot> {
        self.last_status
    }

    /// Preset index of the last accepted `TARGET` command.
    pub fn last_target(&self) -> Option<u8> {
        self.last_target
    }

    fn send(&mut self, command: &Command) -> DriverResult<()> {
        let payload = command.to_payload();
        debug!("Carousel send: {:?}", payload);
        self.transport.write_all(&encode_frame(&payload))?;
        self.transport.flush()?;
        Ok(())
    }

    fn read_response(&mut self) -> DriverResult<Response> {
        let start = Instant::now();
        let mut buf = [0u8; 64];

        loop {
            if let Some(frame) = self.decoder.next_frame() {
                let payload = frame?;
                trace!("Carousel recv: {:?}", payload);
                return Ok(Response::parse(&payload)?);
            }
            if start.elapsed() >= self.timeout {
                return Err(DriverError::CommunicationTimeout);
            }

            match self.transport.read(&mut buf) {
                Ok(0) => {
                    return Err(DriverError::ConnectionFailed(
                        "Connection closed by carousel".to_string(),
                    ));
                }
                Ok(n) => self.decoder.push(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(DriverError::CommunicationTimeout);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Err(DriverError::CommunicationTimeout);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send one command and return its response.
    ///
    /// Arguments are checked against protocol bounds before sending.
    pub fn request(&mut self, command: Command) -> DriverResult<Response> {
        command
            .validate()
            .map_err(|e| DriverError::InvalidArgument(e.to_string()))?;

        // Anything still buffered belongs to an exchange that already failed
        self.decoder.clear();
        self.transport.discard_input()?;
        self.send(&command)?;
        self.read_response()
    }

    fn command(&mut self, command: Command) -> DriverResult<()> {
        match self.request(command)? {
            Response::Ack => Ok(()),
            Response::Error(code) => {
                warn!("{} rejected: {}", command.keyword(), code);
                Err(DriverError::Device(code))
            }
            other => Err(DriverError::UnexpectedResponse(other.to_payload())),
        }
    }

    /// Home both axes.
    pub fn home(&mut self) -> DriverResult<()> {
        info!("Homing carousel");
        self.command(Command::Home)
    }

    /// Rotate to `angle` degrees at `speed` deg/s.
    pub fn rotate(&mut self, angle: f64, speed: f64) -> DriverResult<()> {
        self.command(Command::Rotate { angle, speed })
    }

    /// Rotate to `angle` degrees at the default rotation speed.
    pub fn rotate_to_angle(&mut self, angle: f64) -> DriverResult<()> {
        self.rotate(angle, self.rotation_speed)
    }

    /// Raster `count` positions from `start` to `end` at `speed` steps/s.
    pub fn raster(&mut self, start: i32, end: i32, count: u32, speed: f64) -> DriverResult<()> {
        self.command(Command::Raster {
            start,
            end,
            count,
            speed,
        })
    }

    /// Spin the rotation axis until stopped.
    pub fn spin(&mut self, speed: f64, direction: Direction) -> DriverResult<()> {
        self.command(Command::Spin { speed, direction })
    }

    /// Spin at the default rotation speed.
    pub fn start_rotation(&mut self, direction: Direction) -> DriverResult<()> {
        self.spin(self.rotation_speed, direction)
    }

    /// Stop all motion.
    pub fn stop(&mut self) -> DriverResult<()> {
        self.command(Command::Stop)
    }

    /// Clear a latched fault. The carousel must be homed again afterwards.
    pub fn reset(&mut self) -> DriverResult<()> {
        self.command(Command::Reset)
    }

    /// Rotate to preset target `index` at the default rotation speed.
    pub fn move_to_target(&mut self, index: u8) -> DriverResult<()> {
        self.move_to_target_at(index, self.rotation_speed)
    }

    /// Rotate to preset target `index` at `speed` deg/s.
    pub fn move_to_target_at(&mut self, index: u8, speed: f64) -> DriverResult<()> {
        self.command(Command::Target { index, speed })?;
        self.last_target = Some(index);
        Ok(())
    }

    /// Move the raster axis by `steps` at `speed` steps/s.
    pub fn jog(&mut self, direction: Direction, steps: u32, speed: f64) -> DriverResult<()> {
        self.command(Command::Jog {
            direction,
            steps,
            speed,
        })
    }

    /// Jog the raster axis by the default jog length and raster speed.
    pub fn step_raster(&mut self, direction: Direction) -> DriverResult<()> {
        self.jog(direction, self.jog_steps, self.raster_speed)
    }

    /// Query the carousel status.
    pub fn status(&mut self) -> DriverResult<StatusSnapshot> {
        match self.request(Command::StatusQuery)? {
            Response::Status(status) => {
                self.last_status = Some(status);
                Ok(status)
            }
            Response::Error(code) => Err(DriverError::Device(code)),
            Response::Ack => Err(DriverError::UnexpectedResponse("ACK".to_string())),
        }
    }

    /// Poll status until the carousel is Idle.
    ///
    /// Fails immediately with [`ErrorCode::Fault`] if the carousel faults.
    pub fn wait_idle(&mut self, timeout: Duration) -> DriverResult<StatusSnapshot> {
        let start = Instant::now();
        loop {
            let status = self.status()?;
            if status.is_idle() {
                return Ok(status);
            }
            if status.mode == Mode::Fault {
                return Err(DriverError::Device(ErrorCode::Fault));
            }
            if start.elapsed() > timeout {
                return Err(DriverError::WaitTimeout(timeout));
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Default rotation speed (deg/s).
    pub fn rotation_speed(&self) -> f64 {
        self.rotation_speed
    }

    /// Set the default rotation speed (deg/s).
    pub fn set_rotation_speed(&mut self, speed: f64) -> DriverResult<()> {
        if !(speed > 0.0 && speed <= MAX_ROTATION_SPEED) {
            return Err(DriverError::InvalidArgument(format!(
                "rotation speed {speed} outside (0, {MAX_ROTATION_SPEED}]"
            )));
        }
        self.rotation_speed = speed;
        Ok(())
    }

    /// Default raster speed (steps/s).
    pub fn raster_speed(&self) -> f64 {
        self.raster_speed
    }

    /// Set the default raster speed (steps/s).
    pub fn set_raster_speed(&mut self, speed: f64) -> DriverResult<()> {
        if !(speed > 0.0 && speed <= MAX_RASTER_SPEED) {
            return Err(DriverError::InvalidArgument(format!(
                "raster speed {speed} outside (0, {MAX_RASTER_SPEED}]"
            )));
        }
        self.raster_speed = speed;
        Ok(())
    }

    /// Default raster jog length (steps).
    pub fn jog_steps(&self) -> u32 {
        self.jog_steps
    }

    /// Set the default raster jog length (steps).
    pub fn set_jog_steps(&mut self, steps: u32) {
        self.jog_steps = steps;
    }

    /// Stop the carousel (best effort) and release the transport.
    pub fn close(mut self) {
        if let Err(e) = self.stop() {
            warn!("Stop on close failed: {}", e);
        }
        debug!("Carousel link closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Transport that records writes and answers each frame from a script.
    ///
    /// A `late` reply is held back until a read has already timed out, like
    /// a device answering just after the host gave up.
    #[derive(Default)]
    struct Scripted {
        written: Vec<u8>,
        inbox: VecDeque<u8>,
        on_write: VecDeque<Vec<u8>>,
        late: Vec<u8>,
        max_read: Option<usize>,
    }

    impl Scripted {
        fn reply(mut self, payload: &str) -> Self {
            self.on_write.push_back(encode_frame(payload));
            self
        }

        fn raw(mut self, bytes: &[u8]) -> Self {
            self.on_write.push_back(bytes.to_vec());
            self
        }

        fn reply_late(mut self, payload: &str) -> Self {
            self.on_write.push_back(Vec::new());
            self.late = encode_frame(payload);
            self
        }

        fn max_read(mut self, n: usize) -> Self {
            self.max_read = Some(n);
            self
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inbox.is_empty() {
                self.inbox.extend(self.late.drain(..));
                return Err(io::Error::new(ErrorKind::TimedOut, "no reply"));
            }
            let limit = self.max_read.unwrap_or(buf.len());
            let n = self.inbox.len().min(buf.len()).min(limit);
            for (slot, byte) in buf.iter_mut().zip(self.inbox.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            if buf.ends_with(b"\n") {
                if let Some(reply) = self.on_write.pop_front() {
                    self.inbox.extend(reply);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Scripted {
        fn discard_input(&mut self) -> io::Result<()> {
            self.inbox.clear();
            Ok(())
        }
    }

    fn driver(script: Scripted) -> CarouselDriver<Scripted> {
        CarouselDriver::new(script, &HostConfig::default())
    }

    #[test]
    fn test_command_writes_one_frame() {
        let mut driver = driver(Scripted::default().reply("ACK"));
        driver.rotate(45.0, 10.0).unwrap();
        assert_eq!(driver.transport().written, encode_frame("ROTATE 45 10"));
    }

    #[test]
    fn test_error_response_maps_to_device_error() {
        let mut driver = driver(Scripted::default().reply("ERROR BUSY"));
        assert!(matches!(
            driver.home(),
            Err(DriverError::Device(ErrorCode::Busy))
        ));
    }

    #[test]
    fn test_status_updates_cache_only_on_success() {
        let script = Scripted::default().reply("STATUS ROTATING 100 20 0 1 1");
        let mut driver = driver(script);
        let status = driver.status().unwrap();
        assert_eq!(status.mode, Mode::Rotating);
        assert_eq!(driver.last_status(), Some(status));

        assert!(matches!(
            driver.status(),
            Err(DriverError::CommunicationTimeout)
        ));
        assert_eq!(driver.last_status(), Some(status));
    }

    #[test]
    fn test_response_split_across_reads() {
        let script = Scripted::default()
            .reply("STATUS IDLE 0 0 0 0 1")
            .max_read(5);
        let mut driver = driver(script);
        assert!(driver.status().unwrap().homed);
    }

    #[test]
    fn test_late_reply_is_not_taken_for_next_answer() {
        let script = Scripted::default()
            .reply_late("ACK")
            .reply("ERROR BUSY")
            .reply("STATUS HOMING 5 5 0 3 0");
        let mut driver = driver(script);

        assert!(matches!(
            driver.home(),
            Err(DriverError::CommunicationTimeout)
        ));
        assert!(!driver.transport().inbox.is_empty());

        assert!(matches!(
            driver.rotate(90.0, 10.0),
            Err(DriverError::Device(ErrorCode::Busy))
        ));
        assert_eq!(driver.status().unwrap().mode, Mode::Homing);
    }

    #[test]
    fn test_corrupt_response_is_protocol_error() {
        let corrupt = format!("ACK*{:04X}\n", ::carousel::protocol::checksum(b"ACK") ^ 1);
        let mut driver = driver(Scripted::default().raw(corrupt.as_bytes()));
        assert!(matches!(
            driver.stop(),
            Err(DriverError::Protocol(FrameError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_invalid_argument_sends_nothing() {
        let mut driver = driver(Scripted::default());
        assert!(matches!(
            driver.rotate(400.0, 10.0),
            Err(DriverError::InvalidArgument(_))
        ));
        assert!(driver.transport().written.is_empty());
    }

    #[test]
    fn test_status_answered_with_ack_is_unexpected() {
        let mut driver = driver(Scripted::default().reply("ACK"));
        assert!(matches!(
            driver.status(),
            Err(DriverError::UnexpectedResponse(_))
        ));
        assert!(driver.last_status().is_none());
    }

    #[test]
    fn test_target_tracks_last_accepted() {
        let script = Scripted::default().reply("ACK").reply("ERROR OUT_OF_RANGE");
        let mut driver = driver(script);
        driver.move_to_target(3).unwrap();
        assert!(driver.move_to_target(9).is_err());
        assert_eq!(driver.last_target(), Some(3));
    }

    #[test]
    fn test_default_speeds() {
        let mut driver = driver(Scripted::default().reply("ACK").reply("ACK"));
        driver.set_rotation_speed(30.0).unwrap();
        driver.set_raster_speed(250.0).unwrap();
        assert!(driver.set_rotation_speed(0.0).is_err());
        assert!(driver.set_raster_speed(f64::NAN).is_err());
        driver.set_jog_steps(12);

        driver.start_rotation(Direction::Clockwise).unwrap();
        driver.step_raster(Direction::CounterClockwise).unwrap();
        let mut expected = encode_frame("SPIN 30 CW");
        expected.extend(encode_frame("JOG CCW 12 250"));
        assert_eq!(driver.transport().written, expected);
    }
}
