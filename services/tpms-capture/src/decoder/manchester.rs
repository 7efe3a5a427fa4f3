//! Pulse classification and Manchester bit recovery
//!
//! Each data bit occupies one symbol made of two half-bit pulses. A level
//! change in the middle of the symbol carries the value (low-high = 1,
//! high-low = 0 before any per-protocol inversion). Two adjacent halves of
//! the same level merge into a single long pulse, so the decoder only ever
//! sees short (one half) or long (two halves) pulses.

/// Nominal pulse widths for one protocol, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    pub te_short: u32,
    pub te_long: u32,
    pub te_delta: u32,
}

impl PulseTiming {
    pub const fn new(te_short: u32, te_long: u32, te_delta: u32) -> Self {
        Self {
            te_short,
            te_long,
            te_delta,
        }
    }

    /// True if `duration_us` is within tolerance of `nominal_us`
    #[inline]
    pub fn matches(&self, duration_us: u32, nominal_us: u32) -> bool {
        duration_us.abs_diff(nominal_us) < self.te_delta
    }

    /// Number of whole short units in a pulse, rounded to nearest
    #[inline]
    pub fn units(&self, duration_us: u32) -> u32 {
        duration_us.saturating_add(self.te_short / 2) / self.te_short
    }
}

/// Classification of one edge against a protocol's timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseClass {
    ShortLow,
    ShortHigh,
    LongLow,
    LongHigh,
    /// Duration matches neither width (noise or end of transmission)
    Reset,
}

impl PulseClass {
    pub fn classify(timing: &PulseTiming, level: bool, duration_us: u32) -> Self {
        let is_long = if timing.matches(duration_us, timing.te_long) {
            true
        } else if timing.matches(duration_us, timing.te_short) {
            false
        } else {
            return PulseClass::Reset;
        };

        match (level, is_long) {
            (true, true) => PulseClass::LongHigh,
            (true, false) => PulseClass::ShortHigh,
            (false, true) => PulseClass::LongLow,
            (false, false) => PulseClass::ShortLow,
        }
    }
}

/// Position within the symbol stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Symbol boundary, next half is low (start of a 1)
    Start1,
    /// Mid-symbol of a 1, line is high
    Mid1,
    /// Mid-symbol of a 0, line is low
    Mid0,
    /// Symbol boundary, next half is high (start of a 0)
    Start0,
}

const RESET_PHASE: Phase = Phase::Mid1;

/// Result of feeding one edge to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManchesterOutput {
    /// A complete symbol was observed
    Bit(bool),
    /// Half a symbol seen, partial phase retained
    Pending,
    /// Out-of-band duration, decoder state was reset
    Reset,
}

/// Two-phase Manchester decoder with optional output inversion
#[derive(Debug, Clone)]
pub struct ManchesterDecoder {
    phase: Phase,
    inverted: bool,
}

impl ManchesterDecoder {
    /// `inverted` selects Manchester II output (every decoded bit flipped)
    pub fn new(inverted: bool) -> Self {
        Self {
            phase: RESET_PHASE,
            inverted,
        }
    }

    /// Align to a symbol boundary whose first half has the given level
    pub fn align(&mut self, first_half_high: bool) {
        self.phase = if first_half_high {
            Phase::Start0
        } else {
            Phase::Start1
        };
    }

    pub fn reset(&mut self) {
        self.phase = RESET_PHASE;
    }

    /// Advance the state machine by one classified pulse.
    ///
    /// An invalid pulse sequence (valid widths in an impossible order)
    /// silently resynchronises; only `PulseClass::Reset` is reported.
    pub fn advance(&mut self, class: PulseClass) -> ManchesterOutput {
        use PulseClass::*;

        let (next, bit) = match (self.phase, class) {
            (_, Reset) => {
                self.phase = RESET_PHASE;
                return ManchesterOutput::Reset;
            }
            (Phase::Start1, ShortLow) => (Phase::Mid1, Some(true)),
            (Phase::Mid1, ShortHigh) => (Phase::Start1, None),
            (Phase::Mid1, LongHigh) => (Phase::Mid0, Some(false)),
            (Phase::Mid0, ShortLow) => (Phase::Start0, None),
            (Phase::Mid0, LongLow) => (Phase::Mid1, Some(true)),
            (Phase::Start0, ShortHigh) => (Phase::Mid0, Some(false)),
            _ => (RESET_PHASE, None),
        };

        self.phase = next;
        match bit {
            Some(b) => ManchesterOutput::Bit(b ^ self.inverted),
            None => ManchesterOutput::Pending,
        }
    }

    /// Classify and decode a raw edge
    pub fn feed(&mut self, timing: &PulseTiming, level: bool, duration_us: u32) -> ManchesterOutput {
        self.advance(PulseClass::classify(timing, level, duration_us))
    }
}
