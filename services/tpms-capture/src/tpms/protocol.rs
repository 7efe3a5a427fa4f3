//! Per-protocol radio parameters and the shared validation contract

use std::ops::RangeInclusive;

use tracing::debug;

use super::types::{ProtocolId, Reading};
use super::{abarth_124, schrader_eg53ma4, schrader_gg4, schrader_smd3ma4};
use crate::decoder::{Frame, PulseTiming};

/// How a protocol announces the start of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    /// A high start pulse followed by a fixed number of Manchester sync bits
    Counted { start_pulse_us: u32, sync_bits: u16 },

    /// A raw PCM bit pattern sampled in `te_short` units, MSB first
    Pattern {
        pattern: u64,
        bits: u8,
        /// Level the first pulse must have, `None` for either
        start_level: Option<bool>,
        /// Minimum length of the first pulse, in units
        start_units: u32,
        accept_inverted: bool,
    },
}

/// Static description of one sensor protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSpec {
    pub id: ProtocolId,
    pub timing: PulseTiming,
    pub preamble: Preamble,
    /// Full payload width; the frame completes when this many bits arrive
    pub payload_bits: u8,
    /// A payload cut short by an out-of-band pulse is still validated at this length
    pub min_bits: u8,
    /// Manchester II on air, decoder output is inverted
    pub inverted: bool,
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("frame too short: {bits} bits, need {min}")]
    TooShort { bits: usize, min: usize },

    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    Checksum { computed: u8, received: u8 },

    #[error("sensor id is zero")]
    ZeroSensorId,
}

impl ProtocolId {
    pub fn spec(&self) -> &'static ProtocolSpec {
        match self {
            ProtocolId::SchraderGg4 => &schrader_gg4::SPEC,
            ProtocolId::SchraderSmd3ma4 => &schrader_smd3ma4::SPEC,
            ProtocolId::SchraderEg53ma4 => &schrader_eg53ma4::SPEC,
            ProtocolId::Abarth124 => &abarth_124::SPEC,
        }
    }

    /// Check integrity and extract the reading carried by `frame`
    pub fn validate_and_extract(&self, frame: &Frame) -> Result<Reading, ValidationError> {
        let min = self.spec().min_bits as usize;
        if frame.bit_count() < min {
            return Err(ValidationError::TooShort {
                bits: frame.bit_count(),
                min,
            });
        }

        let bytes = frame.bytes();
        let reading = match self {
            ProtocolId::SchraderGg4 => schrader_gg4::validate(&bytes)?,
            ProtocolId::SchraderSmd3ma4 => schrader_smd3ma4::validate(&bytes)?,
            ProtocolId::SchraderEg53ma4 => schrader_eg53ma4::validate(&bytes)?,
            ProtocolId::Abarth124 => abarth_124::validate(&bytes)?,
        };

        if reading.sensor_id == 0 {
            return Err(ValidationError::ZeroSensorId);
        }
        Ok(reading)
    }
}

/// Raw-unit window inside which a frame with a bad checksum is still accepted
pub(crate) struct Plausibility {
    pub pressure: RangeInclusive<u8>,
    pub temperature: RangeInclusive<u8>,
}

impl Plausibility {
    /// Compare checksums; on mismatch fall back to the plausibility window.
    ///
    /// The fallback keeps partial or noisy captures whose pressure and
    /// temperature bytes look like real tire data.
    pub fn verify(
        &self,
        protocol: ProtocolId,
        computed: u8,
        received: u8,
        pressure_raw: u8,
        temperature_raw: u8,
    ) -> Result<(), ValidationError> {
        if computed == received {
            return Ok(());
        }

        if self.pressure.contains(&pressure_raw) && self.temperature.contains(&temperature_raw) {
            debug!(
                "{}: checksum mismatch ({:#04x} != {:#04x}) but data looks valid, accepting",
                protocol, computed, received
            );
            return Ok(());
        }

        Err(ValidationError::Checksum { computed, received })
    }
}
