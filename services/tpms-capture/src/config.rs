//! Configuration loaded from environment variables

use std::path::PathBuf;
use std::str::FromStr;

use crate::history::{ProtocolFilter, DEFAULT_HISTORY_MAX};
use crate::radio::{is_frequency_supported, ModulationPreset};
use crate::session::{LockState, ScanMode};
use crate::sweep::SweepConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("frequency {0} Hz is outside the supported bands")]
    UnsupportedFrequency(u32),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// RAW capture to replay, `None` reads stdin
    pub capture_path: Option<PathBuf>,

    pub scan_mode: ScanMode,

    /// Sweep candidate frequencies in Hz, first one doubles as the scan frequency
    pub frequencies: Vec<u32>,

    /// Sweep candidate presets, first one doubles as the scan preset
    pub presets: Vec<ModulationPreset>,

    pub sweep_seconds_per_combo: u32,

    pub sweep_max_cycles: u32,

    /// Scheduler tick period in milliseconds
    pub tick_ms: u32,

    pub protocol_filter: ProtocolFilter,

    pub history_max: usize,

    pub lock: LockState,

    /// Pace the replay at signal speed
    pub replay_realtime: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_path: None,
            scan_mode: ScanMode::Scan,
            frequencies: vec![433_920_000, 315_000_000],
            presets: vec![
                ModulationPreset::Am650,
                ModulationPreset::Am270,
                ModulationPreset::Fm238,
                ModulationPreset::Fm12k,
                ModulationPreset::Fm476,
            ],
            sweep_seconds_per_combo: 2,
            sweep_max_cycles: 3,
            tick_ms: 100,
            protocol_filter: ProtocolFilter::All,
            history_max: DEFAULT_HISTORY_MAX,
            lock: LockState::Unlocked,
            replay_realtime: false,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_list<T: FromStr>(key: &'static str, value: &str) -> Result<Vec<T>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse(key, s))
        .collect()
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, unset keys keep their default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("TPMS_CAPTURE_PATH") {
            config.capture_path = match path.trim() {
                "" | "-" => None,
                p => Some(PathBuf::from(p)),
            };
        }
        if let Some(v) = lookup("TPMS_SCAN_MODE") {
            config.scan_mode = parse("TPMS_SCAN_MODE", &v)?;
        }
        if let Some(v) = lookup("TPMS_FREQUENCIES") {
            config.frequencies = parse_list("TPMS_FREQUENCIES", &v)?;
        }
        if let Some(v) = lookup("TPMS_PRESETS") {
            config.presets = parse_list("TPMS_PRESETS", &v)?;
        }
        if let Some(v) = lookup("TPMS_SWEEP_SECONDS_PER_COMBO") {
            config.sweep_seconds_per_combo = parse("TPMS_SWEEP_SECONDS_PER_COMBO", &v)?;
        }
        if let Some(v) = lookup("TPMS_SWEEP_MAX_CYCLES") {
            config.sweep_max_cycles = parse("TPMS_SWEEP_MAX_CYCLES", &v)?;
        }
        if let Some(v) = lookup("TPMS_TICK_MS") {
            config.tick_ms = parse("TPMS_TICK_MS", &v)?;
        }
        if let Some(v) = lookup("TPMS_PROTOCOL_FILTER") {
            config.protocol_filter = parse("TPMS_PROTOCOL_FILTER", &v)?;
        }
        if let Some(v) = lookup("TPMS_HISTORY_MAX") {
            config.history_max = parse("TPMS_HISTORY_MAX", &v)?;
        }
        if let Some(v) = lookup("TPMS_LOCKED") {
            config.lock = if parse_bool("TPMS_LOCKED", &v)? {
                LockState::Locked
            } else {
                LockState::Unlocked
            };
        }
        if let Some(v) = lookup("TPMS_REPLAY_REALTIME") {
            config.replay_realtime = parse_bool("TPMS_REPLAY_REALTIME", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequencies.is_empty() {
            return Err(ConfigError::Empty("TPMS_FREQUENCIES"));
        }
        if let Some(&f) = self.frequencies.iter().find(|&&f| !is_frequency_supported(f)) {
            return Err(ConfigError::UnsupportedFrequency(f));
        }
        if self.presets.is_empty() {
            return Err(ConfigError::Empty("TPMS_PRESETS"));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Zero("TPMS_TICK_MS"));
        }
        if self.sweep_max_cycles == 0 {
            return Err(ConfigError::Zero("TPMS_SWEEP_MAX_CYCLES"));
        }
        if self.ticks_per_combo() == 0 {
            return Err(ConfigError::Zero("TPMS_SWEEP_SECONDS_PER_COMBO"));
        }
        if self.history_max == 0 {
            return Err(ConfigError::Zero("TPMS_HISTORY_MAX"));
        }
        Ok(())
    }

    pub fn ticks_per_combo(&self) -> u32 {
        SweepConfig::ticks_for(self.sweep_seconds_per_combo, self.tick_ms)
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::new(
            self.frequencies.clone(),
            self.presets.clone(),
            self.ticks_per_combo(),
            self.sweep_max_cycles,
        )
    }
}
