//! Host-side drivers for the target carousel.
//!
//! The device-side core lives in the `carousel` crate; this crate talks to it
//! over a serial line (or TCP to `mock_carousel`) using the same frame codec.
//!
//! # Features
//!
//! - `carousel-driver` - carousel host driver, transports and tools (default)

#[cfg(feature = "carousel-driver")]
pub mod carousel;
