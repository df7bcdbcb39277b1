//! Serial protocol between host and carousel.
//!
//! [`frame`] handles delimiting and checksums, [`command`] and [`response`]
//! give the payloads their types.

pub mod command;
pub mod frame;
pub mod response;

pub use command::{
    Command, MAX_ANGLE, MAX_JOG_STEPS, MAX_RASTER_COUNT, MAX_RASTER_SPEED, MAX_ROTATION_SPEED,
};
pub use frame::{checksum, decode_frame, encode_frame, FrameDecoder, FrameError, MAX_FRAME_LEN};
pub use response::Response;
