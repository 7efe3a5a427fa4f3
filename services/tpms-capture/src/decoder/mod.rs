//! Edge-timing decoder pipeline
//!
//! Turns the (level, duration) edge stream from the radio front-end into
//! validated sensor readings:
//! 1. Classify each pulse against the protocol's short/long widths
//! 2. Manchester-decode half-bit pulses into bits
//! 3. Find the preamble and accumulate a fixed-width payload frame
//! 4. Hand the frame to the protocol validator

pub mod assembler;
pub mod bits;
pub mod manchester;
pub mod receiver;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{FrameAssembler, Step};
pub use bits::{BitBuffer, Frame};
pub use manchester::{ManchesterDecoder, ManchesterOutput, PulseClass, PulseTiming};
pub use receiver::{DecoderStats, Receiver};

use serde::Serialize;

/// One radio transition: the level that was held and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeEvent {
    pub level: bool,
    pub duration_us: u32,
}

impl EdgeEvent {
    pub fn new(level: bool, duration_us: u32) -> Self {
        Self { level, duration_us }
    }

    pub fn high(duration_us: u32) -> Self {
        Self::new(true, duration_us)
    }

    pub fn low(duration_us: u32) -> Self {
        Self::new(false, duration_us)
    }
}
