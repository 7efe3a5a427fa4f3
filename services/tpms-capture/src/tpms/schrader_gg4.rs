//! Schrader GG4
//!
//! 64-bit Manchester payload after a 360us start pulse and 8 sync bits:
//!
//! ```text
//! byte 0    : L--- IIII   L = battery low, I = id bits 27..24
//! byte 1..3 : id bits 23..0
//! byte 4    : pressure, 2.5 kPa per unit
//! byte 5    : temperature, deg C + 50
//! byte 6    : status
//! byte 7    : CRC-8 (poly 0x07, init 0xC0) over bytes 0..6
//! ```

use super::checksum::crc8;
use super::protocol::{Preamble, ProtocolSpec, ValidationError};
use super::types::{BatteryStatus, ProtocolId, Reading};
use crate::decoder::PulseTiming;

const CRC_POLY: u8 = 0x07;
const CRC_INIT: u8 = 0xC0;

pub const SPEC: ProtocolSpec = ProtocolSpec {
    id: ProtocolId::SchraderGg4,
    timing: PulseTiming::new(120, 240, 55),
    preamble: Preamble::Counted {
        start_pulse_us: 360,
        sync_bits: 8,
    },
    payload_bits: 64,
    min_bits: 64,
    inverted: false,
};

pub fn validate(b: &[u8]) -> Result<Reading, ValidationError> {
    if b.len() < 8 {
        return Err(ValidationError::TooShort {
            bits: b.len() * 8,
            min: 64,
        });
    }

    let computed = crc8(&b[..7], CRC_POLY, CRC_INIT);
    if computed != b[7] {
        return Err(ValidationError::Checksum {
            computed,
            received: b[7],
        });
    }

    let sensor_id = (u32::from(b[0] & 0x0F) << 24)
        | (u32::from(b[1]) << 16)
        | (u32::from(b[2]) << 8)
        | u32::from(b[3]);

    let battery = if b[0] & 0x80 != 0 {
        BatteryStatus::Low
    } else {
        BatteryStatus::Ok
    };

    Ok(Reading {
        protocol: ProtocolId::SchraderGg4,
        sensor_id,
        pressure_bar: f32::from(b[4]) * 2.5 / 100.0,
        temperature_c: Some(f32::from(b[5]) - 50.0),
        battery,
    })
}
