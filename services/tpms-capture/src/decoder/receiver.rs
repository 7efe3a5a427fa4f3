//! Multi-protocol receiver: every edge goes to every enabled assembler

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use super::assembler::FrameAssembler;
use super::EdgeEvent;
use crate::tpms::{ProtocolId, Reading, ValidationError};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    pub edges: u64,
    pub frames_assembled: u64,
    pub readings: u64,
    pub checksum_errors: u64,
    pub short_frames: u64,
    pub zero_ids: u64,
}

impl fmt::Display for DecoderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Edges: {} | Frames: {} | Readings: {} | Checksum errors: {} | Short: {} | Zero ids: {}",
            self.edges,
            self.frames_assembled,
            self.readings,
            self.checksum_errors,
            self.short_frames,
            self.zero_ids
        )
    }
}

pub struct Receiver {
    assemblers: Vec<FrameAssembler>,
    stats: DecoderStats,
}

impl Receiver {
    pub fn new(protocols: &[ProtocolId]) -> Self {
        Self {
            assemblers: protocols.iter().map(|p| FrameAssembler::new(p.spec())).collect(),
            stats: DecoderStats::default(),
        }
    }

    /// Receiver listening for every supported protocol
    pub fn with_all() -> Self {
        Self::new(&ProtocolId::ALL)
    }

    pub fn protocols(&self) -> impl Iterator<Item = ProtocolId> + '_ {
        self.assemblers.iter().map(|a| a.spec().id)
    }

    /// Feed one edge, returning any readings completed by it
    pub fn feed(&mut self, edge: EdgeEvent) -> Vec<Reading> {
        self.stats.edges += 1;
        let mut readings = Vec::new();

        for assembler in &mut self.assemblers {
            let Some(frame) = assembler.feed(edge) else {
                continue;
            };
            self.stats.frames_assembled += 1;

            let protocol = frame.protocol();
            match protocol.validate_and_extract(&frame) {
                Ok(reading) => {
                    trace!("{}: frame {} -> id {}", protocol, frame.to_hex(), reading.id_hex());
                    self.stats.readings += 1;
                    readings.push(reading);
                }
                Err(e) => {
                    match e {
                        ValidationError::Checksum { .. } => self.stats.checksum_errors += 1,
                        ValidationError::TooShort { .. } => self.stats.short_frames += 1,
                        ValidationError::ZeroSensorId => self.stats.zero_ids += 1,
                    }
                    debug!("{}: rejected frame {} ({} bits): {}", protocol, frame.to_hex(), frame.bit_count(), e);
                }
            }
        }

        readings
    }

    /// Drop all partial decoder state, e.g. after a retune
    pub fn reset(&mut self) {
        for assembler in &mut self.assemblers {
            assembler.reset();
        }
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::with_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testing::transmission;
    use crate::decoder::Step;
    use crate::tpms::checksum::{crc8, sum8, xor8};
    use crate::tpms::BatteryStatus;

    fn run(receiver: &mut Receiver, edges: &[EdgeEvent]) -> Vec<Reading> {
        edges.iter().flat_map(|&e| receiver.feed(e)).collect()
    }

    #[test]
    fn test_eg53ma4_reading() {
        let mut payload = vec![0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 92, 77];
        payload.push(sum8(&payload));

        let mut receiver = Receiver::with_all();
        let readings = run(&mut receiver, &transmission(ProtocolId::SchraderEg53ma4, &payload, 20));

        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.protocol, ProtocolId::SchraderEg53ma4);
        assert_eq!(r.sensor_id, 0x123456);
        assert!((r.pressure_bar - 2.3).abs() < 1e-4);
        assert!((r.temperature_c.unwrap() - 25.0).abs() < 1e-4);
        assert_eq!(receiver.stats().readings, 1);
    }

    #[test]
    fn test_gg4_reading() {
        let mut payload = vec![0x8A, 0x1B, 0x2C, 0x3D, 0x5C, 0x4B, 0x01];
        payload.push(crc8(&payload, 0x07, 0xC0));

        let mut receiver = Receiver::with_all();
        let readings = run(&mut receiver, &transmission(ProtocolId::SchraderGg4, &payload, 0));

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_id, 0xA1B2C3D);
        assert_eq!(readings[0].battery, BatteryStatus::Low);
    }

    #[test]
    fn test_abarth_reading() {
        let mut payload = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 167, 72, 0x00];
        payload.push(xor8(&payload));

        let mut receiver = Receiver::with_all();
        let readings = run(&mut receiver, &transmission(ProtocolId::Abarth124, &payload, 0));

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].protocol, ProtocolId::Abarth124);
        assert_eq!(readings[0].temperature_c, Some(22.0));
    }

    #[test]
    fn test_smd3ma4_reading() {
        // id 0x1A2B3C, pressure raw 160, packed after 3 flag bits
        let payload = [0x03, 0x45, 0x67, 0x94, 0x00];

        let mut receiver = Receiver::with_all();
        let readings = run(&mut receiver, &transmission(ProtocolId::SchraderSmd3ma4, &payload, 0));

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_id, 0x1A2B3C);
        assert!((readings[0].pressure_psi() - 32.0).abs() < 0.05);
    }

    /// Deterministic xorshift source for noise edges
    struct Noise(u64);

    impl Noise {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn edge(&mut self) -> EdgeEvent {
            let v = self.next();
            EdgeEvent::new(v & 1 == 1, 1 + ((v >> 1) % 1000) as u32)
        }
    }

    #[test]
    fn test_noise_yields_no_reading() {
        let mut receiver = Receiver::with_all();
        for seed in 1..=50u64 {
            let mut noise = Noise(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let edges: Vec<EdgeEvent> = (0..2000).map(|_| noise.edge()).collect();
            assert!(run(&mut receiver, &edges).is_empty(), "seed {}", seed);
        }
        assert_eq!(receiver.stats().readings, 0);
        assert_eq!(receiver.stats().edges, 100_000);
    }

    #[test]
    fn test_pattern_preambles_tolerate_jitter() {
        let mut abarth = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 167, 72, 0x00];
        abarth.push(xor8(&abarth));
        let mut receiver = Receiver::with_all();
        let readings = run(&mut receiver, &transmission(ProtocolId::Abarth124, &abarth, 20));
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_id, 0xDEADBEEF);

        let smd = [0x03, 0x45, 0x67, 0x94, 0x00];
        let mut receiver = Receiver::with_all();
        let readings = run(&mut receiver, &transmission(ProtocolId::SchraderSmd3ma4, &smd, 55));
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_id, 0x1A2B3C);
    }

    #[test]
    fn test_bad_checksum_counted() {
        let mut payload = vec![0x0A, 0x1B, 0x2C, 0x3D, 0x5C, 0x4B, 0x01];
        payload.push(crc8(&payload, 0x07, 0xC0) ^ 0x01);

        let mut receiver = Receiver::with_all();
        assert!(run(&mut receiver, &transmission(ProtocolId::SchraderGg4, &payload, 0)).is_empty());
        assert_eq!(receiver.stats().checksum_errors, 1);
        assert_eq!(receiver.stats().frames_assembled, 1);
    }

    #[test]
    fn test_zero_id_rejected() {
        let mut payload = vec![0x00; 9];
        payload[7] = 92;
        payload[8] = 77;
        payload.push(sum8(&payload));

        let mut receiver = Receiver::with_all();
        assert!(run(&mut receiver, &transmission(ProtocolId::SchraderEg53ma4, &payload, 0)).is_empty());
        assert_eq!(receiver.stats().zero_ids, 1);
    }

    #[test]
    fn test_single_protocol_receiver_ignores_others() {
        let mut payload = vec![0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 92, 77];
        payload.push(sum8(&payload));

        let mut receiver = Receiver::new(&[ProtocolId::Abarth124]);
        assert!(run(&mut receiver, &transmission(ProtocolId::SchraderEg53ma4, &payload, 0)).is_empty());
        assert_eq!(receiver.protocols().collect::<Vec<_>>(), vec![ProtocolId::Abarth124]);
    }

    #[test]
    fn test_reset_drops_partial_state() {
        let mut payload = vec![0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 92, 77];
        payload.push(sum8(&payload));
        let edges = transmission(ProtocolId::SchraderEg53ma4, &payload, 0);

        let mut receiver = Receiver::new(&[ProtocolId::SchraderEg53ma4]);
        run(&mut receiver, &edges[..edges.len() / 2]);
        assert_ne!(receiver.assemblers[0].step(), Step::Reset);

        receiver.reset();
        assert_eq!(receiver.assemblers[0].step(), Step::Reset);
        assert!(run(&mut receiver, &edges[edges.len() / 2..]).is_empty());
    }
}
