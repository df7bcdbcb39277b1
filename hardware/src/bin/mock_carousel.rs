//! Simulated carousel served over TCP.
//!
//! Runs the device tick loop against a simulated plant and speaks the wire
//! protocol on a TCP socket, so `carousel_tool --tcp` and the host driver can
//! be exercised without hardware. One client at a time; when a client goes
//! away the device stops all motion, as it would on serial disconnect.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::Result;
use carousel::sim::SimulatedPlant;
use carousel::{CarouselConfig, Device};
use clap::Parser;
use tracing::{debug, info, warn};

/// Simulated target carousel
#[derive(Parser, Debug)]
#[command(name = "mock_carousel")]
#[command(about = "Serve a simulated target carousel over TCP")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    bind: String,

    /// Device configuration file (JSON)
    #[arg(long)]
    device_config: Option<PathBuf>,

    /// Physical rotation position at power-on (steps)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    rotation_start: i64,

    /// Physical raster position at power-on (steps)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    raster_start: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.device_config {
        Some(path) => CarouselConfig::load_from_file(path)?,
        None => CarouselConfig::default(),
    };
    config.validate()?;
    let plant = SimulatedPlant::new(&config, args.rotation_start, args.raster_start);
    let mut device = Device::with_plant(config, &plant);

    let listener = TcpListener::bind(&args.bind)?;
    info!("Mock carousel listening on {}", args.bind);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream.peer_addr()?;
                info!("Client connected from {}", peer);
                if let Err(e) = serve(&mut device, stream) {
                    warn!("Client {} error: {}", peer, e);
                }
                device.disconnect();
                info!(
                    "Client {} gone after {} ticks, carousel in {}",
                    peer,
                    device.ticks(),
                    device.status().mode
                );
            }
            Err(e) => warn!("Accept failed: {}", e),
        }
    }

    Ok(())
}

/// Run the tick loop for one client until it disconnects.
fn serve(device: &mut Device, mut stream: TcpStream) -> Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;

    let period = device.tick_period();
    let mut buf = [0u8; 256];
    let mut next_tick = Instant::now();

    loop {
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    debug!("Received {} bytes", n);
                    device.receive(&buf[..n]);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let reply = device.tick(period);
        if !reply.is_empty() {
            stream.set_nonblocking(false)?;
            stream.write_all(&reply)?;
            stream.flush()?;
            stream.set_nonblocking(true)?;
        }

        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            // Fell behind, don't try to make up lost ticks in a burst
            next_tick = now;
        }
    }
}
