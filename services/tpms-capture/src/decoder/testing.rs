//! Synthetic edge streams for decoder tests

use super::EdgeEvent;
use crate::tpms::{Preamble, ProtocolId};

/// Gap before and after a transmission, far outside any pulse width
pub(crate) const GAP_US: u32 = 5000;

/// Builds an edge stream from half-bit units, merging equal adjacent levels
pub(crate) struct EdgeEncoder {
    te_short: u32,
    pulses: Vec<(bool, u32)>,
    jitter_us: u32,
}

impl EdgeEncoder {
    pub fn new(te_short: u32) -> Self {
        Self {
            te_short,
            pulses: Vec::new(),
            jitter_us: 0,
        }
    }

    /// Alternately lengthen and shorten every pulse except gaps
    pub fn with_jitter(mut self, jitter_us: u32) -> Self {
        self.jitter_us = jitter_us;
        self
    }

    pub fn push_pulse(&mut self, level: bool, duration_us: u32) {
        match self.pulses.last_mut() {
            Some((last, d)) if *last == level => *d += duration_us,
            _ => self.pulses.push((level, duration_us)),
        }
    }

    pub fn push_raw_bit(&mut self, bit: bool) {
        self.push_pulse(bit, self.te_short);
    }

    /// One Manchester symbol: 1 is low-high, 0 is high-low on air
    pub fn push_manchester(&mut self, bit: bool, inverted: bool) {
        let m = bit ^ inverted;
        self.push_raw_bit(!m);
        self.push_raw_bit(m);
    }

    pub fn finish(mut self) -> Vec<EdgeEvent> {
        let last = self.pulses.last().map_or(true, |&(level, _)| level);
        self.pulses.push((!last, GAP_US));

        let jitter = self.jitter_us;
        self.pulses
            .iter()
            .enumerate()
            .map(|(i, &(level, d))| {
                let d = if d >= GAP_US || jitter == 0 {
                    d
                } else if i % 2 == 0 {
                    d + jitter
                } else {
                    d - jitter
                };
                EdgeEvent::new(level, d)
            })
            .collect()
    }
}

/// Edges for one complete transmission of `payload` bytes
pub(crate) fn transmission(protocol: ProtocolId, payload: &[u8], jitter_us: u32) -> Vec<EdgeEvent> {
    let bits = usize::from(protocol.spec().payload_bits);
    encode(protocol, payload, bits, jitter_us)
}

/// Like [`transmission`] but stops after `bits` payload bits
pub(crate) fn truncated_transmission(protocol: ProtocolId, payload: &[u8], bits: usize) -> Vec<EdgeEvent> {
    encode(protocol, payload, bits, 0)
}

fn encode(protocol: ProtocolId, payload: &[u8], bits: usize, jitter_us: u32) -> Vec<EdgeEvent> {
    let spec = protocol.spec();
    let mut enc = EdgeEncoder::new(spec.timing.te_short).with_jitter(jitter_us);
    enc.push_pulse(false, GAP_US);

    match spec.preamble {
        Preamble::Counted {
            start_pulse_us,
            sync_bits,
        } => {
            enc.push_pulse(true, start_pulse_us);
            for _ in 0..sync_bits {
                // low half first, as the decoder aligns after the start pulse
                enc.push_raw_bit(false);
                enc.push_raw_bit(true);
            }
        }
        Preamble::Pattern {
            pattern,
            bits: width,
            start_level,
            start_units,
            ..
        } => {
            let first = pattern >> (width - 1) & 1 == 1;
            // Leading pattern units already long enough need no lead-in
            let lead_units = (0..width).take_while(|i| (pattern >> (width - 1 - i) & 1 == 1) == first).count() as u32;
            if start_level.map_or(false, |l| l != first) || lead_units < start_units {
                let level = start_level.unwrap_or(first);
                for _ in 0..start_units {
                    enc.push_raw_bit(level);
                }
            }
            for i in (0..width).rev() {
                enc.push_raw_bit(pattern >> i & 1 == 1);
            }
        }
    }

    for i in 0..bits {
        let bit = payload[i / 8] & (0x80 >> (i % 8)) != 0;
        enc.push_manchester(bit, spec.inverted);
    }

    enc.finish()
}
