//! Abarth 124 Spider (VDO/Continental, shared with Fiat 124 and Mazda MX-5 ND)
//!
//! Raw preamble `0xAAA9` (either polarity), then 72 Manchester bits:
//!
//! ```text
//! byte 0..3 : id
//! byte 4    : flags
//! byte 5    : pressure, 1.38 kPa per unit
//! byte 6    : temperature, deg C + 50
//! byte 7    : status
//! byte 8    : XOR of bytes 0..7
//! ```

use super::checksum::xor8;
use super::protocol::{Plausibility, Preamble, ProtocolSpec, ValidationError};
use super::types::{BatteryStatus, ProtocolId, Reading};
use crate::decoder::PulseTiming;

pub const SPEC: ProtocolSpec = ProtocolSpec {
    id: ProtocolId::Abarth124,
    timing: PulseTiming::new(52, 104, 25),
    preamble: Preamble::Pattern {
        pattern: 0xAAA9,
        bits: 16,
        start_level: None,
        start_units: 2,
        accept_inverted: true,
    },
    payload_bits: 72,
    min_bits: 72,
    inverted: true,
};

const PLAUSIBLE: Plausibility = Plausibility {
    pressure: 50..=253,
    temperature: 20..=150,
};

pub fn validate(b: &[u8]) -> Result<Reading, ValidationError> {
    if b.len() < 9 {
        return Err(ValidationError::TooShort {
            bits: b.len() * 8,
            min: 72,
        });
    }

    PLAUSIBLE.verify(ProtocolId::Abarth124, xor8(&b[..8]), b[8], b[5], b[6])?;

    let sensor_id = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);

    Ok(Reading {
        protocol: ProtocolId::Abarth124,
        sensor_id,
        pressure_bar: f32::from(b[5]) * 1.38 * 0.01,
        temperature_c: Some(f32::from(b[6]) - 50.0),
        battery: BatteryStatus::NotApplicable,
    })
}
