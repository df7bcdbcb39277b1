//! Command dispatch.
//!
//! Turns decoded frames into state machine calls and produces the single
//! response each frame is owed.

use tracing::{debug, info, warn};

use crate::error::{CarouselError, ErrorCode};
use crate::protocol::{Command, FrameError, Response};
use crate::state_machine::Carousel;

/// Dispatches host commands to a [`Carousel`].
pub struct CommandHandler {
    carousel: Carousel,
}

impl CommandHandler {
    /// Wrap a carousel.
    pub fn new(carousel: Carousel) -> Self {
        Self { carousel }
    }

    /// The carousel being driven.
    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    /// Mutable access for the tick loop.
    pub fn carousel_mut(&mut self) -> &mut Carousel {
        &mut self.carousel
    }

    /// Answer one decoded frame.
    pub fn handle_frame(&mut self, frame: Result<String, FrameError>) -> Response {
        match frame {
            Ok(payload) => self.handle_payload(&payload),
            Err(e) => {
                warn!("Rejected frame: {}", e);
                Response::Error(ErrorCode::InvalidCommand)
            }
        }
    }

    /// Answer one frame payload.
    pub fn handle_payload(&mut self, payload: &str) -> Response {
        match Command::parse(payload) {
            Ok(command) => self.dispatch(command),
            Err(e) => {
                warn!("Rejected {:?}: {}", payload, e);
                Response::Error(e.code())
            }
        }
    }

    /// Execute a validated command.
    pub fn dispatch(&mut self, command: Command) -> Response {
        debug!("Dispatching {:?} in {}", command, self.carousel.mode());
        let result = match command {
            Command::Home => self.carousel.home(),
            Command::Rotate { angle, speed } => self.carousel.rotate(angle, speed),
            Command::Raster {
                start,
                end,
                count,
                speed,
            } => self
                .carousel
                .raster(i64::from(start), i64::from(end), count, speed),
            Command::Spin { speed, direction } => self.carousel.spin(speed, direction),
            Command::Stop => {
                self.carousel.stop();
                Ok(())
            }
            Command::Reset => self.carousel.reset(),
            Command::StatusQuery => return Response::Status(self.carousel.status()),
            Command::Target { index, speed } => {
                self.carousel.rotate_to_target(usize::from(index), speed)
            }
            Command::Jog {
                direction,
                steps,
                speed,
            } => self.carousel.jog(direction, steps, speed),
        };

        match result {
            Ok(()) => {
                if command.is_motion() {
                    info!("{} accepted", command.to_payload());
                }
                Response::Ack
            }
            Err(e) => {
                log_rejection(&command, &e);
                Response::Error(e.code())
            }
        }
    }
}

fn log_rejection(command: &Command, error: &CarouselError) {
    match error {
        CarouselError::Busy | CarouselError::NotHomed => {
            debug!("{} rejected: {}", command.keyword(), error)
        }
        _ => warn!("{} rejected: {}", command.keyword(), error),
    }
}
