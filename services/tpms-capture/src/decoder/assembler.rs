//! Preamble detection and payload accumulation for one protocol

use tracing::trace;

use super::bits::{BitBuffer, Frame};
use super::manchester::{ManchesterDecoder, ManchesterOutput};
use super::EdgeEvent;
use crate::tpms::{Preamble, ProtocolSpec};

/// Pulses longer than this many units abort a raw preamble search
const MAX_PREAMBLE_PULSE_UNITS: u32 = 8;

/// Units of a start pulse that count towards a raw preamble
const MAX_START_UNITS: u32 = 4;

/// Extra bits tolerated past the pattern width before giving up
const PREAMBLE_SEARCH_SLACK: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Reset,
    CheckingPreamble,
    DecodingPayload,
}

/// Per-protocol frame assembler.
///
/// Fed every edge; yields a [`Frame`] when a payload completes, or when a
/// payload of at least `min_bits` is cut off by an out-of-band pulse.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    spec: &'static ProtocolSpec,
    step: Step,
    bits: BitBuffer,
    manchester: ManchesterDecoder,
    /// Sync bits counted, or raw units searched for a pattern preamble
    preamble_count: u32,
    /// Sliding window of raw units, newest in bit 0
    preamble_window: u64,
}

impl FrameAssembler {
    pub fn new(spec: &'static ProtocolSpec) -> Self {
        Self {
            spec,
            step: Step::Reset,
            bits: BitBuffer::with_capacity(spec.payload_bits),
            manchester: ManchesterDecoder::new(spec.inverted),
            preamble_count: 0,
            preamble_window: 0,
        }
    }

    pub fn spec(&self) -> &'static ProtocolSpec {
        self.spec
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn reset(&mut self) {
        self.step = Step::Reset;
        self.bits.clear();
        self.manchester.reset();
        self.preamble_count = 0;
        self.preamble_window = 0;
    }

    pub fn feed(&mut self, edge: EdgeEvent) -> Option<Frame> {
        match self.step {
            Step::Reset => {
                self.try_start(edge);
                None
            }
            Step::CheckingPreamble => self.check_preamble(edge),
            Step::DecodingPayload => self.decode_payload(edge),
        }
    }

    /// Look for the start pulse that opens a preamble
    fn try_start(&mut self, edge: EdgeEvent) {
        let timing = &self.spec.timing;

        match self.spec.preamble {
            Preamble::Counted { start_pulse_us, .. } => {
                if edge.level && timing.matches(edge.duration_us, start_pulse_us) {
                    self.reset();
                    self.step = Step::CheckingPreamble;
                    self.manchester.align(false);
                }
            }
            Preamble::Pattern {
                start_level,
                start_units,
                ..
            } => {
                let units = timing.units(edge.duration_us);
                let level_ok = start_level.map_or(true, |l| l == edge.level);
                if level_ok && units >= start_units {
                    self.reset();
                    self.step = Step::CheckingPreamble;
                    for _ in 0..units.min(MAX_START_UNITS) {
                        self.push_preamble_unit(edge.level);
                    }
                }
            }
        }
    }

    fn abort_preamble(&mut self, edge: EdgeEvent) {
        self.reset();
        self.try_start(edge);
    }

    fn check_preamble(&mut self, edge: EdgeEvent) -> Option<Frame> {
        match self.spec.preamble {
            Preamble::Counted { sync_bits, .. } => {
                match self.manchester.feed(&self.spec.timing, edge.level, edge.duration_us) {
                    ManchesterOutput::Bit(_) => {
                        self.preamble_count += 1;
                        if self.preamble_count >= u32::from(sync_bits) {
                            trace!("{}: sync complete", self.spec.id);
                            self.bits.clear();
                            self.step = Step::DecodingPayload;
                        }
                    }
                    ManchesterOutput::Pending => {}
                    ManchesterOutput::Reset => self.abort_preamble(edge),
                }
                None
            }
            Preamble::Pattern { bits, .. } => {
                let units = self.spec.timing.units(edge.duration_us);
                if units == 0 || units > MAX_PREAMBLE_PULSE_UNITS {
                    self.abort_preamble(edge);
                    return None;
                }

                for used in 1..=units {
                    self.push_preamble_unit(edge.level);
                    if self.pattern_matched() {
                        trace!("{}: preamble matched", self.spec.id);
                        return self.enter_payload(edge.level, units - used);
                    }
                }

                if self.preamble_count > u32::from(bits) + PREAMBLE_SEARCH_SLACK {
                    self.abort_preamble(edge);
                }
                None
            }
        }
    }

    fn push_preamble_unit(&mut self, level: bool) {
        self.preamble_window = (self.preamble_window << 1) | u64::from(level);
        self.preamble_count += 1;
    }

    fn pattern_matched(&self) -> bool {
        let Preamble::Pattern {
            pattern,
            bits,
            accept_inverted,
            ..
        } = self.spec.preamble
        else {
            return false;
        };

        if self.preamble_count < u32::from(bits) {
            return false;
        }

        let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
        let window = self.preamble_window & mask;
        window == pattern || (accept_inverted && window == !pattern & mask)
    }

    /// Switch to payload decoding once a raw preamble completed mid-pulse.
    ///
    /// Units of the completing pulse past the pattern are the first half of
    /// the first payload symbol; with none left over, the first half is the
    /// opposite level.
    fn enter_payload(&mut self, level: bool, leftover_units: u32) -> Option<Frame> {
        self.bits.clear();
        self.step = Step::DecodingPayload;

        if leftover_units > 0 {
            self.manchester.align(level);
            let residual = EdgeEvent::new(level, leftover_units * self.spec.timing.te_short);
            self.decode_payload(residual)
        } else {
            self.manchester.align(!level);
            None
        }
    }

    fn decode_payload(&mut self, edge: EdgeEvent) -> Option<Frame> {
        match self.manchester.feed(&self.spec.timing, edge.level, edge.duration_us) {
            ManchesterOutput::Bit(bit) => {
                self.bits.push(bit);
                if self.bits.is_full() {
                    let frame = self.take_frame();
                    self.reset();
                    return Some(frame);
                }
                None
            }
            ManchesterOutput::Pending => None,
            ManchesterOutput::Reset => {
                let frame = if self.bits.len() >= usize::from(self.spec.min_bits) {
                    trace!(
                        "{}: payload cut at {} bits, emitting partial frame",
                        self.spec.id,
                        self.bits.len()
                    );
                    Some(self.take_frame())
                } else {
                    None
                };
                self.abort_preamble(edge);
                frame
            }
        }
    }

    fn take_frame(&mut self) -> Frame {
        let bits = std::mem::replace(&mut self.bits, BitBuffer::with_capacity(self.spec.payload_bits));
        Frame::new(self.spec.id, bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testing::{transmission, truncated_transmission};
    use crate::tpms::ProtocolId;

    fn run(assembler: &mut FrameAssembler, edges: &[EdgeEvent]) -> Vec<Frame> {
        edges.iter().filter_map(|&e| assembler.feed(e)).collect()
    }

    const EG53_PAYLOAD: [u8; 10] = [0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 0x5C, 0x4D, 0x45];

    #[test]
    fn test_noise_yields_nothing() {
        let mut assembler = FrameAssembler::new(ProtocolId::SchraderEg53ma4.spec());
        let noise: Vec<EdgeEvent> = (0..200)
            .map(|i| EdgeEvent::new(i % 2 == 0, 37 + (i * 53) % 900))
            .collect();
        assert!(run(&mut assembler, &noise).is_empty());
    }

    #[test]
    fn test_counted_preamble_frame() {
        let mut assembler = FrameAssembler::new(ProtocolId::SchraderEg53ma4.spec());
        let edges = transmission(ProtocolId::SchraderEg53ma4, &EG53_PAYLOAD, 0);

        let frames = run(&mut assembler, &edges);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bit_count(), 80);
        assert_eq!(frames[0].bytes(), EG53_PAYLOAD.to_vec());
        assert_eq!(assembler.step(), Step::Reset);
    }

    #[test]
    fn test_counted_preamble_with_jitter() {
        let mut assembler = FrameAssembler::new(ProtocolId::SchraderEg53ma4.spec());
        let edges = transmission(ProtocolId::SchraderEg53ma4, &EG53_PAYLOAD, 25);

        let frames = run(&mut assembler, &edges);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes(), EG53_PAYLOAD.to_vec());
    }

    #[test]
    fn test_pattern_preamble_frame() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0xA7, 0x48, 0x00, 0xCD];
        let mut assembler = FrameAssembler::new(ProtocolId::Abarth124.spec());
        let edges = transmission(ProtocolId::Abarth124, &payload, 0);

        let frames = run(&mut assembler, &edges);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes(), payload.to_vec());
    }

    #[test]
    fn test_pattern_preamble_both_leading_levels() {
        // First payload bit 0 and 1 exercise both leftover paths
        for first in [0x00u8, 0xFF] {
            let payload = [first, 0x11, 0x22, 0x33, 0x40];
            let mut assembler = FrameAssembler::new(ProtocolId::SchraderSmd3ma4.spec());
            let edges = transmission(ProtocolId::SchraderSmd3ma4, &payload, 0);

            let frames = run(&mut assembler, &edges);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].bit_count(), 37);
            assert_eq!(frames[0].bytes(), payload.to_vec());
        }
    }

    #[test]
    fn test_partial_frame_on_trailing_reset() {
        let payload = [0x05, 0x11, 0x22, 0x33, 0x40];
        let mut assembler = FrameAssembler::new(ProtocolId::SchraderSmd3ma4.spec());

        let frames = run(&mut assembler, &truncated_transmission(ProtocolId::SchraderSmd3ma4, &payload, 35));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bit_count(), 35);
        assert_eq!(frames[0].bytes(), payload.to_vec());

        let frames = run(&mut assembler, &truncated_transmission(ProtocolId::SchraderSmd3ma4, &payload, 34));
        assert!(frames.is_empty());
    }

    #[test]
    fn test_restart_after_noise_mid_preamble() {
        let mut assembler = FrameAssembler::new(ProtocolId::SchraderEg53ma4.spec());
        let mut edges = vec![EdgeEvent::low(3000), EdgeEvent::high(246), EdgeEvent::low(123), EdgeEvent::high(900)];
        edges.extend(transmission(ProtocolId::SchraderEg53ma4, &EG53_PAYLOAD, 0));

        let frames = run(&mut assembler, &edges);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bytes(), EG53_PAYLOAD.to_vec());
    }
}
