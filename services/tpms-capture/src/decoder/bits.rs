//! Bounded bit accumulator and assembled frames

use crate::tpms::ProtocolId;

/// Largest payload any protocol may declare
pub const MAX_FRAME_BITS: u8 = 128;

/// MSB-first bit accumulator sized to a protocol's payload width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitBuffer {
    data: u128,
    len: u8,
    capacity: u8,
}

impl BitBuffer {
    pub fn with_capacity(capacity: u8) -> Self {
        debug_assert!(
            capacity > 0 && capacity <= MAX_FRAME_BITS,
            "bit buffer capacity {} out of range",
            capacity
        );
        Self {
            data: 0,
            len: 0,
            capacity: capacity.min(MAX_FRAME_BITS),
        }
    }

    /// Append a bit. Returns false (and drops the bit) once full.
    pub fn push(&mut self, bit: bool) -> bool {
        if self.len >= self.capacity {
            debug_assert!(false, "push past capacity {}", self.capacity);
            return false;
        }
        self.data = (self.data << 1) | bit as u128;
        self.len += 1;
        true
    }

    pub fn clear(&mut self) {
        self.data = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Raw accumulated value, right-aligned
    pub fn value(&self) -> u128 {
        self.data
    }

    /// Bytes MSB-first; a trailing partial byte is zero-padded on the right
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_bytes = (self.len() + 7) / 8;
        let pad = num_bytes * 8 - self.len();
        let aligned = self.data << pad;

        (0..num_bytes)
            .map(|i| (aligned >> ((num_bytes - 1 - i) * 8)) as u8)
            .collect()
    }
}

/// A completed payload, consumed once by the protocol validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    protocol: ProtocolId,
    bits: BitBuffer,
}

impl Frame {
    pub fn new(protocol: ProtocolId, bits: BitBuffer) -> Self {
        Self { protocol, bits }
    }

    pub fn protocol(&self) -> ProtocolId {
        self.protocol
    }

    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bits.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.bytes())
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(protocol: ProtocolId, bytes: &[u8], bit_count: usize) -> Self {
        let mut bits = BitBuffer::with_capacity(bit_count as u8);
        for i in 0..bit_count {
            bits.push(bytes[i / 8] & (0x80 >> (i % 8)) != 0);
        }
        Self::new(protocol, bits)
    }
}
