//! Integrity checks used by the sensor protocols

/// Sum of bytes modulo 256
pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// XOR of all bytes
pub fn xor8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// MSB-first CRC-8 with arbitrary polynomial and initial value
pub fn crc8(bytes: &[u8], poly: u8, init: u8) -> u8 {
    let mut crc = init;

    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
