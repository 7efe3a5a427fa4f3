//! Schrader EG53MA4 (Chevrolet, Saab, Opel)
//!
//! 80-bit Manchester payload after a 246us start pulse and 40 sync bits:
//! 4 flag bytes, 24-bit id, pressure (25 mbar per unit), temperature in
//! deg F, then the 8-bit sum of bytes 0..8.

use super::checksum::sum8;
use super::protocol::{Plausibility, Preamble, ProtocolSpec, ValidationError};
use super::types::{BatteryStatus, ProtocolId, Reading};
use crate::decoder::PulseTiming;

pub const SPEC: ProtocolSpec = ProtocolSpec {
    id: ProtocolId::SchraderEg53ma4,
    timing: PulseTiming::new(123, 246, 60),
    preamble: Preamble::Counted {
        start_pulse_us: 246,
        sync_bits: 40,
    },
    payload_bits: 80,
    min_bits: 80,
    inverted: true,
};

const PLAUSIBLE: Plausibility = Plausibility {
    pressure: 20..=200,
    temperature: 20..=180,
};

pub fn validate(b: &[u8]) -> Result<Reading, ValidationError> {
    if b.len() < 10 {
        return Err(ValidationError::TooShort {
            bits: b.len() * 8,
            min: 80,
        });
    }

    PLAUSIBLE.verify(ProtocolId::SchraderEg53ma4, sum8(&b[..9]), b[9], b[7], b[8])?;

    let sensor_id = (u32::from(b[4]) << 16) | (u32::from(b[5]) << 8) | u32::from(b[6]);
    let temp_f = f32::from(b[8]);

    Ok(Reading {
        protocol: ProtocolId::SchraderEg53ma4,
        sensor_id,
        pressure_bar: f32::from(b[7]) * 25.0 / 1000.0,
        temperature_c: Some((temp_f - 32.0) * 5.0 / 9.0),
        battery: BatteryStatus::NotApplicable,
    })
}
