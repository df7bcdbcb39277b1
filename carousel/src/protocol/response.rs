//! Typed device responses.
//!
//! Every accepted frame is answered with exactly one of:
//!
//! ```text
//! ACK
//! ERROR <CODE>
//! STATUS <MODE> <rotation> <raster> <fault 0|1> <enable bits> <homed 0|1>
//! ```

use std::str::FromStr;

use crate::error::ErrorCode;
use crate::protocol::frame::FrameError;
use crate::state_machine::Mode;
use crate::status::{MotorEnable, StatusSnapshot};

/// A response sent from the carousel to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Command accepted
    Ack,
    /// Command rejected, state unchanged
    Error(ErrorCode),
    /// Status report
    Status(StatusSnapshot),
}

fn malformed(message: impl Into<String>) -> FrameError {
    FrameError::Malformed(message.into())
}

fn parse_flag(token: &str) -> Result<bool, FrameError> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(malformed(format!("expected 0 or 1, got {other:?}"))),
    }
}

fn parse_field<T: FromStr>(name: &str, token: &str) -> Result<T, FrameError> {
    token
        .parse()
        .map_err(|_| malformed(format!("{name}: cannot parse {token:?}")))
}

impl Response {
    /// Encode as a frame payload.
    pub fn to_payload(&self) -> String {
        match self {
            Response::Ack => "ACK".to_string(),
            Response::Error(code) => format!("ERROR {code}"),
            Response::Status(status) => format!(
                "STATUS {} {} {} {} {} {}",
                status.mode,
                status.rotation_position,
                status.raster_position,
                u8::from(status.fault),
                status.motors.bits(),
                u8::from(status.homed),
            ),
        }
    }

    /// Decode a frame payload.
    pub fn parse(payload: &str) -> Result<Self, FrameError> {
        let tokens: Vec<&str> = payload.split_ascii_whitespace().collect();
        match tokens.as_slice() {
            ["ACK"] => Ok(Response::Ack),
            ["ERROR", code] => ErrorCode::from_str(code)
                .map(Response::Error)
                .map_err(|_| malformed(format!("unknown error code {code:?}"))),
            ["STATUS", mode, rotation, raster, fault, motors, homed] => {
                let mode = Mode::from_str(mode)
                    .map_err(|_| malformed(format!("unknown mode {mode:?}")))?;
                let bits: u8 = parse_field("motors", motors)?;
                let motors = MotorEnable::from_bits(bits)
                    .ok_or_else(|| malformed(format!("unknown motor bits {bits}")))?;
                Ok(Response::Status(StatusSnapshot {
                    mode,
                    rotation_position: parse_field("rotation", rotation)?,
                    raster_position: parse_field("raster", raster)?,
                    motors,
                    fault: parse_flag(fault)?,
                    homed: parse_flag(homed)?,
                }))
            }
            _ => Err(malformed(format!("unrecognised response {payload:?}"))),
        }
    }
}
