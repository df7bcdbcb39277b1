//! In-process transport to a simulated carousel.
//!
//! Writes feed the device's receive buffer; reads run the device tick loop.
//! Simulated time follows the wall clock (scaled by `time_scale`), so a host
//! that sleeps between polls sees motion progress as it would on hardware.
//! When a read finds nothing waiting, a few extra ticks are run so a pending
//! command frame gets serviced; if there is still no reply the read fails
//! with [`ErrorKind::TimedOut`] like a serial port would.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use ::carousel::sim::SimulatedPlant;
use ::carousel::{CarouselConfig, Device};
use tracing::trace;

use super::transport::Transport;

/// Extra ticks a read may run while waiting for a reply.
const REPLY_TICKS: u32 = 16;

/// Upper bound on ticks run in one catch-up.
const MAX_CATCH_UP_TICKS: u64 = 1_000_000;

/// Byte transport backed by an in-process [`Device`].
pub struct LoopbackTransport {
    device: Device,
    plant: SimulatedPlant,
    outbox: VecDeque<u8>,
    tick: Duration,
    time_scale: f64,
    last_sync: Instant,
    link_up: bool,
}

impl LoopbackTransport {
    /// Simulated carousel with both mechanisms at physical zero.
    pub fn new(config: CarouselConfig) -> Self {
        let plant = SimulatedPlant::new(&config, 0, 0);
        Self::with_plant(config, plant)
    }

    /// Simulated carousel driving an existing plant.
    pub fn with_plant(config: CarouselConfig, plant: SimulatedPlant) -> Self {
        let tick = config.tick_period();
        Self {
            device: Device::with_plant(config, &plant),
            plant,
            outbox: VecDeque::new(),
            tick,
            time_scale: 1.0,
            last_sync: Instant::now(),
            link_up: true,
        }
    }

    /// Run simulated time `scale` times faster than the wall clock.
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale.max(0.0);
        self
    }

    /// Shared handles to the simulated mechanisms.
    pub fn plant(&self) -> &SimulatedPlant {
        &self.plant
    }

    /// The simulated device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Cut or restore the link. While down, writes are dropped and the
    /// device keeps running but its replies are lost.
    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    /// Run `count` device ticks, collecting any replies.
    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            let reply = self.device.tick(self.tick);
            if self.link_up {
                self.outbox.extend(reply);
            }
        }
    }

    fn catch_up(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sync).as_secs_f64() * self.time_scale;
        let due = (elapsed / self.tick.as_secs_f64()) as u64;
        if due > 0 {
            trace!("Loopback catching up {} ticks", due);
            self.run_ticks(due.min(MAX_CATCH_UP_TICKS));
            self.last_sync = now;
        }
    }
}

impl Read for LoopbackTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.catch_up();
        let mut spare = REPLY_TICKS;
        while self.outbox.is_empty() && spare > 0 {
            self.run_ticks(1);
            spare -= 1;
        }
        if self.outbox.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "no reply from carousel"));
        }

        let n = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for LoopbackTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.catch_up();
        if self.link_up {
            self.device.receive(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for LoopbackTransport {
    fn discard_input(&mut self) -> io::Result<()> {
        self.catch_up();
        if !self.outbox.is_empty() {
            trace!("Loopback discarding {} stale bytes", self.outbox.len());
            self.outbox.clear();
        }
        Ok(())
    }
}
