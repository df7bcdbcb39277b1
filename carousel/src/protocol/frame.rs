//! Frame codec for the carousel serial protocol.
//!
//! # Frame Format
//!
//! ```text
//! ROTATE 45 10*7A3C\n
//! └──payload──┘ └crc┘
//! ```
//!
//! A frame is a printable-ASCII payload, a `*` separator, the CRC-16/IBM-3740
//! (CCITT-FALSE) of the payload as 4 uppercase hex digits, and a line feed.
//! A carriage return before the line feed is tolerated so the controller can
//! be driven from a terminal.
//!
//! Serial reads can split or merge frames arbitrarily; [`FrameDecoder`]
//! buffers bytes until a delimiter arrives and queues every complete frame.

use std::collections::VecDeque;

use crc::{Crc, CRC_16_IBM_3740};
use thiserror::Error;
use tracing::trace;

/// Frame delimiter.
pub const FRAME_END: u8 = b'\n';

/// Separator between payload and checksum.
pub const CHECKSUM_SEPARATOR: u8 = b'*';

/// Longest frame accepted, delimiter included.
pub const MAX_FRAME_LEN: usize = 128;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Errors detected while decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame had no payload.
    #[error("Empty frame")]
    Empty,

    /// No `*` separator before the delimiter.
    #[error("Missing checksum")]
    MissingChecksum,

    /// Checksum field is not 4 hex digits.
    #[error("Invalid checksum field: {0:?}")]
    InvalidChecksumField(String),

    /// Checksum did not match the payload.
    #[error("Checksum mismatch: computed {computed:04X}, received {received:04X}")]
    ChecksumMismatch {
        /// CRC computed over the received payload
        computed: u16,
        /// CRC carried by the frame
        received: u16,
    },

    /// Frame exceeded [`MAX_FRAME_LEN`] before a delimiter arrived.
    #[error("Frame longer than {} bytes", MAX_FRAME_LEN)]
    Oversize,

    /// Payload contains non-printable or non-ASCII bytes.
    #[error("Payload is not printable ASCII")]
    NotAscii,

    /// Payload decoded but its contents are not a valid message.
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// CRC-16/IBM-3740 of a payload.
pub fn checksum(payload: &[u8]) -> u16 {
    CRC16.checksum(payload)
}

/// Wrap a payload into a complete frame, delimiter included.
pub fn encode_frame(payload: &str) -> Vec<u8> {
    let crc = checksum(payload.as_bytes());
    format!("{payload}*{crc:04X}\n").into_bytes()
}

/// Decode one frame (without its trailing `\n`) into its payload.
pub fn decode_frame(frame: &[u8]) -> Result<String, FrameError> {
    let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
    if frame.is_empty() {
        return Err(FrameError::Empty);
    }

    let split = frame
        .iter()
        .rposition(|&b| b == CHECKSUM_SEPARATOR)
        .ok_or(FrameError::MissingChecksum)?;
    let (payload, crc_field) = (&frame[..split], &frame[split + 1..]);

    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    if !payload.iter().all(|b| (0x20..0x7F).contains(b)) {
        return Err(FrameError::NotAscii);
    }

    let crc_text = String::from_utf8_lossy(crc_field);
    if crc_field.len() != 4 || !crc_field.iter().all(u8::is_ascii_hexdigit) {
        return Err(FrameError::InvalidChecksumField(crc_text.into_owned()));
    }
    let received = u16::from_str_radix(&crc_text, 16)
        .map_err(|_| FrameError::InvalidChecksumField(crc_text.to_string()))?;
    let computed = checksum(payload);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    // All bytes checked as printable ASCII above
    Ok(payload.iter().map(|&b| b as char).collect())
}

/// Incremental frame splitter for a byte stream.
///
/// Feed it whatever the transport returned with [`push`](Self::push) and
/// pull complete frames with [`next_frame`](Self::next_frame).
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    discarding: bool,
    frames: VecDeque<Result<String, FrameError>>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes, queueing any frames they complete.
    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == FRAME_END {
                if self.discarding {
                    self.discarding = false;
                } else {
                    let frame = decode_frame(&self.buffer);
                    trace!("Frame complete: {:?}", frame);
                    self.frames.push_back(frame);
                }
                self.buffer.clear();
                continue;
            }

            if self.discarding {
                continue;
            }
            self.buffer.push(byte);
            if self.buffer.len() >= MAX_FRAME_LEN {
                self.buffer.clear();
                self.discarding = true;
                self.frames.push_back(Err(FrameError::Oversize));
            }
        }
    }

    /// Pop the oldest complete frame.
    pub fn next_frame(&mut self) -> Option<Result<String, FrameError>> {
        self.frames.pop_front()
    }

    /// Number of complete frames waiting.
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    /// Whether a partial frame is buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty() || self.discarding
    }

    /// Drop all buffered bytes and queued frames.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
        self.frames.clear();
    }
}
