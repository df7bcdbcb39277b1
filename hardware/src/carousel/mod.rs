//! Target carousel host driver.
//!
//! # Example
//!
//! ```no_run
//! use hardware::carousel::{CarouselDriver, HostConfig};
//!
//! let config = HostConfig::default();
//! let mut driver = CarouselDriver::open_serial(&config)?;
//!
//! driver.home()?;
//! driver.wait_idle(std::time::Duration::from_secs(30))?;
//! driver.rotate_to_angle(90.0)?;
//! let status = driver.wait_idle(std::time::Duration::from_secs(30))?;
//! println!("Rotation at step {}", status.rotation_position);
//!
//! driver.close();
//! # Ok::<(), hardware::carousel::DriverError>(())
//! ```

pub mod config;
pub mod driver;
pub mod loopback;
pub mod transport;

pub use config::HostConfig;
pub use driver::{CarouselDriver, DriverError, DriverResult};
pub use loopback::LoopbackTransport;
pub use transport::{connect_tcp, list_ports, open_serial, Transport};
