//! Schrader SMD3MA4 (Subaru, some Infiniti/Nissan)
//!
//! Raw preamble `0xF5555555E` (36 PCM units), then 37 Manchester bits:
//! 3 flag bits, 24-bit id, 8-bit pressure in 0.2 PSI steps and 2 trailing
//! bits. No temperature and no checksum.

use super::protocol::{Preamble, ProtocolSpec, ValidationError};
use super::types::{BatteryStatus, ProtocolId, Reading};
use crate::decoder::PulseTiming;

const BAR_PER_PSI: f32 = 0.068_947_6;

pub const SPEC: ProtocolSpec = ProtocolSpec {
    id: ProtocolId::SchraderSmd3ma4,
    timing: PulseTiming::new(120, 240, 60),
    preamble: Preamble::Pattern {
        pattern: 0xF_5555_555E,
        bits: 36,
        start_level: Some(true),
        start_units: 3,
        accept_inverted: false,
    },
    payload_bits: 37,
    min_bits: 35,
    inverted: true,
};

pub fn validate(b: &[u8]) -> Result<Reading, ValidationError> {
    if b.len() < 5 {
        return Err(ValidationError::TooShort {
            bits: b.len() * 8,
            min: 35,
        });
    }

    let sensor_id = (u32::from(b[0] & 0x1F) << 19)
        | (u32::from(b[1]) << 11)
        | (u32::from(b[2]) << 3)
        | u32::from(b[3] >> 5);

    let pressure_raw = ((b[3] & 0x1F) << 3) | (b[4] >> 5);

    Ok(Reading {
        protocol: ProtocolId::SchraderSmd3ma4,
        sensor_id,
        pressure_bar: f32::from(pressure_raw) * 0.2 * BAR_PER_PSI,
        temperature_c: None,
        battery: BatteryStatus::NotApplicable,
    })
}
