//! Command-line control of the target carousel.
//!
//! One subcommand per carousel operation:
//! - `home`, `rotate`, `raster`, `spin`, `target`, `jog`: start motion
//! - `stop`, `reset`: halt motion or clear a latched fault
//! - `status`: print a status snapshot
//! - `wait`: block until the carousel is Idle
//! - `ports`: list serial ports
//! - `repl`: type raw command payloads interactively
//!
//! Connects over the serial port by default, to `mock_carousel` with `--tcp`,
//! or to an in-process simulated carousel with `--simulate`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use carousel::protocol::{Command as WireCommand, Response};
use carousel::{CarouselConfig, Direction, StatusSnapshot};
use clap::{Parser, Subcommand};
use hardware::carousel::{list_ports, CarouselDriver, HostConfig, LoopbackTransport, Transport};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

/// Target carousel control tool
#[derive(Parser, Debug)]
#[command(name = "carousel_tool")]
#[command(about = "Control tool for the PLD target carousel")]
#[command(version)]
struct Args {
    /// Host configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device configuration file (JSON), used for --simulate and angle display
    #[arg(long, global = true)]
    device_config: Option<PathBuf>,

    /// Serial port, overrides the configuration file
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate, overrides the configuration file
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Connect to a mock_carousel at this address instead of a serial port
    #[arg(long, global = true)]
    tcp: Option<String>,

    /// Drive an in-process simulated carousel
    #[arg(long, global = true)]
    simulate: bool,

    /// After a motion command, wait this many seconds for Idle
    #[arg(long, global = true)]
    wait: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Home both axes
    Home,

    /// Rotate to an absolute angle
    Rotate {
        /// Angle in degrees (0-360)
        angle: f64,

        /// Speed in degrees per second (default from configuration)
        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// Raster through evenly spaced positions
    Raster {
        /// First raster position in steps
        #[arg(allow_hyphen_values = true)]
        start: i32,

        /// Last raster position in steps
        #[arg(allow_hyphen_values = true)]
        end: i32,

        /// Number of positions, start and end included
        #[arg(short, long, default_value = "2")]
        count: u32,

        /// Speed in steps per second (default from configuration)
        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// Spin the rotation axis until stopped
    Spin {
        /// CW or CCW
        direction: Direction,

        /// Speed in degrees per second (default from configuration)
        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// Rotate to a preset target
    Target {
        /// Preset index
        index: u8,

        /// Speed in degrees per second (default from configuration)
        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// Jog the raster axis
    Jog {
        /// CW or CCW
        direction: Direction,

        /// Steps to move (default from configuration)
        #[arg(short = 'n', long)]
        steps: Option<u32>,

        /// Speed in steps per second (default from configuration)
        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// Stop all motion
    Stop,

    /// Clear a latched fault
    Reset,

    /// Print carousel status
    Status,

    /// Wait until the carousel is Idle
    Wait {
        /// Timeout in seconds
        #[arg(short, long, default_value = "60")]
        timeout: f64,
    },

    /// List serial ports
    Ports,

    /// Interactive command REPL
    Repl,
}

type Driver = CarouselDriver<Box<dyn Transport>>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    if let Command::Ports = args.command {
        return cmd_ports();
    }

    let host = load_host_config(&args)?;
    let device_config = match &args.device_config {
        Some(path) => CarouselConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CarouselConfig::default(),
    };
    let steps_per_rev = device_config.rotation.steps_per_revolution;
    let mut driver = connect(&args, &host, device_config)?;

    let moved = match args.command {
        Command::Home => {
            driver.home()?;
            true
        }
        Command::Rotate { angle, speed } => {
            match speed {
                Some(speed) => driver.rotate(angle, speed)?,
                None => driver.rotate_to_angle(angle)?,
            }
            true
        }
        Command::Raster {
            start,
            end,
            count,
            speed,
        } => {
            let speed = speed.unwrap_or(driver.raster_speed());
            driver.raster(start, end, count, speed)?;
            true
        }
        Command::Spin { direction, speed } => {
            match speed {
                Some(speed) => driver.spin(speed, direction)?,
                None => driver.start_rotation(direction)?,
            }
            false
        }
        Command::Target { index, speed } => {
            match speed {
                Some(speed) => driver.move_to_target_at(index, speed)?,
                None => driver.move_to_target(index)?,
            }
            true
        }
        Command::Jog {
            direction,
            steps,
            speed,
        } => {
            let steps = steps.unwrap_or(driver.jog_steps());
            let speed = speed.unwrap_or(driver.raster_speed());
            driver.jog(direction, steps, speed)?;
            true
        }
        Command::Stop => {
            driver.stop()?;
            false
        }
        Command::Reset => {
            driver.reset()?;
            info!("Fault cleared, home the carousel before moving");
            false
        }
        Command::Status => {
            print_status(&driver.status()?, steps_per_rev);
            false
        }
        Command::Wait { timeout } => {
            let status = driver.wait_idle(wait_timeout(timeout)?)?;
            print_status(&status, steps_per_rev);
            false
        }
        Command::Repl => {
            cmd_repl(&mut driver, steps_per_rev)?;
            false
        }
        Command::Ports => false,
    };

    if moved {
        println!("OK");
        if let Some(timeout) = args.wait {
            let status = driver.wait_idle(wait_timeout(timeout)?)?;
            print_status(&status, steps_per_rev);
        }
    }

    Ok(())
}

fn wait_timeout(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("Invalid wait timeout {secs} s"))
}

fn load_host_config(args: &Args) -> Result<HostConfig> {
    let mut host = match &args.config {
        Some(path) => HostConfig::load_from_file(path)?,
        None => HostConfig::default(),
    };
    if let Some(port) = &args.port {
        host.port = port.clone();
    }
    if let Some(baud) = args.baud {
        host.baud_rate = baud;
    }
    if let Some(addr) = &args.tcp {
        host.tcp_address = Some(addr.clone());
    }
    host.validate()?;
    Ok(host)
}

fn connect(args: &Args, host: &HostConfig, device_config: CarouselConfig) -> Result<Driver> {
    let transport: Box<dyn Transport> = if args.simulate {
        info!("Using in-process simulated carousel");
        Box::new(LoopbackTransport::new(device_config))
    } else if let Some(addr) = &host.tcp_address {
        info!("Connecting to carousel at {}...", addr);
        Box::new(hardware::carousel::connect_tcp(
            addr.as_str(),
            host.response_timeout(),
        )?)
    } else {
        info!("Opening {} at {} baud...", host.port, host.baud_rate);
        Box::new(hardware::carousel::open_serial(
            &host.port,
            host.baud_rate,
            host.response_timeout(),
        )?)
    };
    Ok(CarouselDriver::new(transport, host))
}

fn print_status(status: &StatusSnapshot, steps_per_rev: u32) {
    println!("Mode:      {}", status.mode);
    println!(
        "Rotation:  {} steps ({:.2} deg)",
        status.rotation_position,
        status.rotation_degrees(steps_per_rev)
    );
    println!("Raster:    {} steps", status.raster_position);
    println!("Motors:    {:?}", status.motors);
    println!("Homed:     {}", status.homed);
    if status.fault {
        println!("FAULT latched, send reset");
    }
}

// ==================== Ports Command ====================

fn cmd_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}  {:?}", port.port_name, port.port_type);
    }
    Ok(())
}

// ==================== REPL Command ====================

fn cmd_repl(driver: &mut Driver, steps_per_rev: u32) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Carousel REPL - enter command payloads, 'quit' to exit");
    println!("Examples: STATUS, HOME, ROTATE 90 10, RASTER 0 1000 5 200, SPIN 30 CW, STOP");
    println!();

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        editor.add_history_entry(input)?;

        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            println!("Bye!");
            break;
        }

        let command = match WireCommand::parse(input) {
            Ok(command) => command,
            Err(e) => {
                println!("Error: {e}");
                continue;
            }
        };
        match driver.request(command) {
            Ok(Response::Status(status)) => print_status(&status, steps_per_rev),
            Ok(response) => println!("{}", response.to_payload()),
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(())
}
