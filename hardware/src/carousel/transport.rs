//! Byte transports for the carousel link.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort, SerialPortInfo};
use tracing::debug;

use super::driver::{DriverError, DriverResult};

/// Anything the driver can exchange frames over.
pub trait Transport: Read + Write + Send {
    /// Throw away bytes that have arrived but not been read yet.
    ///
    /// Called before every request so a reply that turns up after its
    /// exchange timed out is not taken as the answer to the next command.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        let waiting = self.bytes_to_read().unwrap_or(0);
        if waiting > 0 {
            debug!("Discarding {} stale bytes from serial port", waiting);
        }
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl Transport for TcpStream {
    fn discard_input(&mut self) -> io::Result<()> {
        self.set_nonblocking(true)?;
        let mut buf = [0u8; 256];
        let mut discarded = 0;
        let result = loop {
            match self.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => discarded += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.set_nonblocking(false)?;
        if discarded > 0 {
            debug!("Discarded {} stale bytes from TCP stream", discarded);
        }
        result
    }
}

impl Transport for Box<dyn Transport> {
    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}

/// Open a serial port with the given per-read timeout.
pub fn open_serial(
    path: &str,
    baud_rate: u32,
    timeout: Duration,
) -> DriverResult<Box<dyn SerialPort>> {
    let port = serialport::new(path, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(timeout)
        .open()
        .map_err(|e| DriverError::ConnectionFailed(format!("Failed to open {path}: {e}")))?;
    debug!("Opened {} at {} baud", path, baud_rate);
    Ok(port)
}

/// Connect to a `mock_carousel` instance.
pub fn connect_tcp<A: ToSocketAddrs>(addr: A, timeout: Duration) -> DriverResult<TcpStream> {
    let stream = TcpStream::connect(addr)
        .map_err(|e| DriverError::ConnectionFailed(format!("Failed to connect: {e}")))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    debug!("Connected to carousel via TCP");
    Ok(stream)
}

/// Serial ports present on this machine.
pub fn list_ports() -> DriverResult<Vec<SerialPortInfo>> {
    serialport::available_ports()
        .map_err(|e| DriverError::ConnectionFailed(format!("Failed to enumerate ports: {e}")))
}
