//! Sweep search over candidate frequency × modulation combinations
//!
//! Pure tick-driven state machine: the session calls [`SweepController::on_tick`]
//! once per scheduler tick and [`SweepController::on_reading`] for every new
//! sensor, and applies the returned [`SweepStep`] to the front-end.

use serde::Serialize;
use tracing::{debug, info};

use crate::radio::{ModulationPreset, RadioSettings};
use crate::tpms::Reading;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("sweep needs at least one frequency")]
    NoFrequencies,

    #[error("sweep needs at least one modulation preset")]
    NoPresets,

    #[error("ticks per combination must be non-zero")]
    ZeroTicks,

    #[error("max cycles must be non-zero")]
    ZeroCycles,

    #[error("start combination ({0}, {1}) is out of range")]
    StartOutOfRange(usize, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub frequencies: Vec<u32>,
    pub presets: Vec<ModulationPreset>,
    pub ticks_per_combo: u32,
    pub max_cycles: u32,
    pub start_frequency: usize,
    pub start_preset: usize,
}

impl SweepConfig {
    pub fn new(
        frequencies: Vec<u32>,
        presets: Vec<ModulationPreset>,
        ticks_per_combo: u32,
        max_cycles: u32,
    ) -> Self {
        Self {
            frequencies,
            presets,
            ticks_per_combo,
            max_cycles,
            start_frequency: 0,
            start_preset: 0,
        }
    }

    pub fn with_start(mut self, frequency_index: usize, preset_index: usize) -> Self {
        self.start_frequency = frequency_index;
        self.start_preset = preset_index;
        self
    }

    /// Tick budget for a per-combination dwell time
    pub fn ticks_for(seconds_per_combo: u32, tick_ms: u32) -> u32 {
        if tick_ms == 0 {
            return 0;
        }
        seconds_per_combo.saturating_mul(1000) / tick_ms
    }

    pub fn combo_count(&self) -> usize {
        self.frequencies.len() * self.presets.len()
    }

    fn validate(&self) -> Result<(), SweepError> {
        if self.frequencies.is_empty() {
            return Err(SweepError::NoFrequencies);
        }
        if self.presets.is_empty() {
            return Err(SweepError::NoPresets);
        }
        if self.ticks_per_combo == 0 {
            return Err(SweepError::ZeroTicks);
        }
        if self.max_cycles == 0 {
            return Err(SweepError::ZeroCycles);
        }
        if self.start_frequency >= self.frequencies.len() || self.start_preset >= self.presets.len() {
            return Err(SweepError::StartOutOfRange(self.start_frequency, self.start_preset));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepOutcome {
    Pending,
    Found {
        settings: RadioSettings,
        reading: Reading,
    },
    Exhausted,
}

/// What the session must do after feeding the controller
#[derive(Debug, Clone, PartialEq)]
pub enum SweepStep {
    Continue,
    /// Stop receive, apply these settings, reset the decoder, restart receive
    Retune(RadioSettings),
    Finished(SweepOutcome),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SweepController {
    config: SweepConfig,
    frequency_index: usize,
    preset_index: usize,
    cycle: u32,
    ticks_in_combo: u32,
    combos_visited: u64,
    outcome: SweepOutcome,
    cancelled: bool,
}

impl SweepController {
    pub fn new(config: SweepConfig) -> Result<Self, SweepError> {
        config.validate()?;
        Ok(Self {
            frequency_index: config.start_frequency,
            preset_index: config.start_preset,
            cycle: 0,
            ticks_in_combo: 0,
            combos_visited: 1,
            outcome: SweepOutcome::Pending,
            cancelled: false,
            config,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Settings for the combination being tried
    pub fn current(&self) -> RadioSettings {
        RadioSettings::new(
            self.config.frequencies[self.frequency_index],
            self.config.presets[self.preset_index],
        )
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn ticks_in_combo(&self) -> u32 {
        self.ticks_in_combo
    }

    pub fn combos_visited(&self) -> u64 {
        self.combos_visited
    }

    pub fn outcome(&self) -> &SweepOutcome {
        &self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.cancelled || self.outcome != SweepOutcome::Pending
    }

    /// Whole seconds left in the current combination, rounded up
    pub fn countdown_secs(&self, tick_ms: u32) -> u32 {
        let remaining = self.config.ticks_per_combo.saturating_sub(self.ticks_in_combo);
        let remaining_ms = u64::from(remaining) * u64::from(tick_ms);
        u32::try_from(remaining_ms.div_ceil(1000)).unwrap_or(u32::MAX)
    }

    fn terminal_step(&self) -> SweepStep {
        if self.cancelled {
            SweepStep::Cancelled
        } else {
            SweepStep::Finished(self.outcome.clone())
        }
    }

    /// Advance by one scheduler tick; `abort` is the cooperative cancel flag
    pub fn on_tick(&mut self, abort: bool) -> SweepStep {
        if self.is_finished() {
            return self.terminal_step();
        }

        if abort {
            info!("Sweep cancelled at {} (cycle {})", self.current(), self.cycle + 1);
            self.cancelled = true;
            return SweepStep::Cancelled;
        }

        self.ticks_in_combo += 1;
        if self.ticks_in_combo < self.config.ticks_per_combo {
            return SweepStep::Continue;
        }

        self.advance();
        if self.cycle >= self.config.max_cycles {
            info!(
                "Sweep exhausted after {} combinations, no signal detected",
                self.combos_visited
            );
            self.outcome = SweepOutcome::Exhausted;
            return SweepStep::Finished(SweepOutcome::Exhausted);
        }

        self.combos_visited += 1;
        let settings = self.current();
        debug!("Sweep cycle {} trying {}", self.cycle + 1, settings);
        SweepStep::Retune(settings)
    }

    /// A new sensor was decoded on the current combination
    pub fn on_reading(&mut self, reading: &Reading) -> SweepStep {
        if self.is_finished() {
            return self.terminal_step();
        }

        let settings = self.current();
        info!("Sweep found {} {} on {}", reading.protocol, reading.id_hex(), settings);
        self.outcome = SweepOutcome::Found {
            settings,
            reading: reading.clone(),
        };
        SweepStep::Finished(self.outcome.clone())
    }

    /// Next preset; on wrap next frequency; back at the start pair ends a cycle
    fn advance(&mut self) {
        self.ticks_in_combo = 0;
        self.preset_index += 1;
        if self.preset_index >= self.config.presets.len() {
            self.preset_index = 0;
            self.frequency_index += 1;
            if self.frequency_index >= self.config.frequencies.len() {
                self.frequency_index = 0;
            }
        }

        if self.frequency_index == self.config.start_frequency && self.preset_index == self.config.start_preset {
            self.cycle += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpms::{BatteryStatus, ProtocolId};

    const F433: u32 = 433_920_000;
    const F315: u32 = 315_000_000;

    fn reading() -> Reading {
        Reading {
            protocol: ProtocolId::SchraderEg53ma4,
            sensor_id: 0x123456,
            pressure_bar: 2.3,
            temperature_c: Some(25.0),
            battery: BatteryStatus::NotApplicable,
        }
    }

    /// Tick until finished, recording every combination tuned (start included)
    fn run_to_end(sweep: &mut SweepController) -> (Vec<RadioSettings>, SweepStep, u32) {
        let mut visited = vec![sweep.current()];
        let mut ticks = 0;
        loop {
            ticks += 1;
            match sweep.on_tick(false) {
                SweepStep::Continue => {}
                SweepStep::Retune(s) => visited.push(s),
                step => return (visited, step, ticks),
            }
        }
    }

    #[test]
    fn test_two_by_two_single_cycle() {
        let ticks = SweepConfig::ticks_for(2, 100);
        assert_eq!(ticks, 20);
        let config = SweepConfig::new(
            vec![F433, F315],
            vec![ModulationPreset::Am650, ModulationPreset::Am270],
            ticks,
            1,
        );
        let mut sweep = SweepController::new(config).unwrap();

        let (visited, end, total_ticks) = run_to_end(&mut sweep);
        assert_eq!(
            visited,
            vec![
                RadioSettings::new(F433, ModulationPreset::Am650),
                RadioSettings::new(F433, ModulationPreset::Am270),
                RadioSettings::new(F315, ModulationPreset::Am650),
                RadioSettings::new(F315, ModulationPreset::Am270),
            ]
        );
        assert_eq!(end, SweepStep::Finished(SweepOutcome::Exhausted));
        assert_eq!(total_ticks, 80);
        assert_eq!(sweep.combos_visited(), 4);
    }

    #[test]
    fn test_round_robin_visits_each_pair_max_cycles_times() {
        let presets = ModulationPreset::ALL.to_vec();
        let config = SweepConfig::new(vec![F433, F315], presets.clone(), 3, 3);
        let mut sweep = SweepController::new(config).unwrap();

        let (visited, end, _) = run_to_end(&mut sweep);
        assert_eq!(end, SweepStep::Finished(SweepOutcome::Exhausted));
        assert_eq!(visited.len(), 2 * presets.len() * 3);
        for (i, settings) in visited.iter().enumerate() {
            let combo = i % (2 * presets.len());
            let expected = RadioSettings::new([F433, F315][combo / presets.len()], presets[combo % presets.len()]);
            assert_eq!(*settings, expected);
        }
    }

    #[test]
    fn test_nonzero_start_completes_full_cycles() {
        let config = SweepConfig::new(
            vec![F433, F315],
            vec![ModulationPreset::Am650, ModulationPreset::Fm476],
            1,
            2,
        )
        .with_start(1, 1);
        let mut sweep = SweepController::new(config).unwrap();

        let (visited, _, _) = run_to_end(&mut sweep);
        assert_eq!(visited.len(), 8);
        assert_eq!(visited[0], RadioSettings::new(F315, ModulationPreset::Fm476));
        assert_eq!(visited[1], RadioSettings::new(F433, ModulationPreset::Am650));
    }

    #[test]
    fn test_early_exit_on_kth_combo() {
        let config = SweepConfig::new(
            vec![F433, F315],
            vec![ModulationPreset::Am650, ModulationPreset::Am270],
            5,
            3,
        );
        let mut sweep = SweepController::new(config).unwrap();

        // Run through two combos, then find a sensor two ticks into the third
        let mut retunes = 0;
        while retunes < 2 {
            if let SweepStep::Retune(_) = sweep.on_tick(false) {
                retunes += 1;
            }
        }
        sweep.on_tick(false);
        sweep.on_tick(false);

        let expected = RadioSettings::new(F315, ModulationPreset::Am650);
        let step = sweep.on_reading(&reading());
        assert_eq!(
            step,
            SweepStep::Finished(SweepOutcome::Found {
                settings: expected,
                reading: reading(),
            })
        );
        assert_eq!(sweep.combos_visited(), 3);

        // No further combinations once found
        for _ in 0..50 {
            assert!(matches!(sweep.on_tick(false), SweepStep::Finished(SweepOutcome::Found { .. })));
        }
        assert_eq!(sweep.current(), expected);
    }

    #[test]
    fn test_cancel_is_distinct_from_exhausted() {
        let config = SweepConfig::new(vec![F433], vec![ModulationPreset::Am650], 10, 1);
        let mut sweep = SweepController::new(config).unwrap();

        assert_eq!(sweep.on_tick(false), SweepStep::Continue);
        assert_eq!(sweep.on_tick(true), SweepStep::Cancelled);
        assert_eq!(sweep.ticks_in_combo(), 1);
        assert_eq!(*sweep.outcome(), SweepOutcome::Pending);
        assert_eq!(sweep.on_tick(false), SweepStep::Cancelled);
        assert_eq!(sweep.on_reading(&reading()), SweepStep::Cancelled);
    }

    #[test]
    fn test_countdown() {
        let config = SweepConfig::new(vec![F433], vec![ModulationPreset::Am650], 20, 1);
        let mut sweep = SweepController::new(config).unwrap();
        assert_eq!(sweep.countdown_secs(100), 2);
        for _ in 0..5 {
            sweep.on_tick(false);
        }
        assert_eq!(sweep.countdown_secs(100), 2);
        for _ in 0..6 {
            sweep.on_tick(false);
        }
        assert_eq!(sweep.countdown_secs(100), 1);
    }

    #[test]
    fn test_countdown_long_combo() {
        let ticks = SweepConfig::ticks_for(5_000_000, 1);
        let config = SweepConfig::new(vec![F433], vec![ModulationPreset::Am650], ticks, 1);
        let sweep = SweepController::new(config).unwrap();
        assert_eq!(ticks, u32::MAX);
        assert_eq!(sweep.countdown_secs(1), 4_294_968);

        let slow = SweepConfig::new(vec![F433], vec![ModulationPreset::Am650], u32::MAX, 1);
        let sweep = SweepController::new(slow).unwrap();
        assert_eq!(sweep.countdown_secs(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_invalid_config() {
        let empty = SweepConfig::new(vec![], vec![ModulationPreset::Am650], 10, 1);
        assert_eq!(SweepController::new(empty).unwrap_err(), SweepError::NoFrequencies);

        let zero = SweepConfig::new(vec![F433], vec![ModulationPreset::Am650], 0, 1);
        assert_eq!(SweepController::new(zero).unwrap_err(), SweepError::ZeroTicks);

        let start = SweepConfig::new(vec![F433], vec![ModulationPreset::Am650], 10, 1).with_start(0, 3);
        assert_eq!(SweepController::new(start).unwrap_err(), SweepError::StartOutOfRange(0, 3));
    }
}
