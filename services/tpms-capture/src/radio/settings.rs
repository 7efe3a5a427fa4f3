//! Frequency and modulation preset

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Default receive frequency when not sweeping
pub const DEFAULT_FREQUENCY_HZ: u32 = 433_920_000;

/// Named CC1101 register presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModulationPreset {
    #[serde(rename = "AM270")]
    Am270,
    #[serde(rename = "AM650")]
    Am650,
    #[serde(rename = "FM238")]
    Fm238,
    #[serde(rename = "FM476")]
    Fm476,
    #[serde(rename = "FM12K")]
    Fm12k,
}

impl ModulationPreset {
    pub const ALL: [ModulationPreset; 5] = [
        ModulationPreset::Am650,
        ModulationPreset::Am270,
        ModulationPreset::Fm238,
        ModulationPreset::Fm12k,
        ModulationPreset::Fm476,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModulationPreset::Am270 => "AM270",
            ModulationPreset::Am650 => "AM650",
            ModulationPreset::Fm238 => "FM238",
            ModulationPreset::Fm476 => "FM476",
            ModulationPreset::Fm12k => "FM12K",
        }
    }
}

impl fmt::Display for ModulationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown modulation preset '{0}'")]
pub struct UnknownPreset(pub String);

impl FromStr for ModulationPreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownPreset(name.to_string()))
    }
}

/// One tunable front-end configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RadioSettings {
    pub frequency_hz: u32,
    pub preset: ModulationPreset,
}

impl RadioSettings {
    pub fn new(frequency_hz: u32, preset: ModulationPreset) -> Self {
        Self {
            frequency_hz,
            preset,
        }
    }

    /// Frequency as "MHz.kk", e.g. "433.92"
    pub fn frequency_text(&self) -> String {
        format!(
            "{:03}.{:02}",
            self.frequency_hz / 1_000_000,
            (self.frequency_hz % 1_000_000) / 10_000
        )
    }
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self::new(DEFAULT_FREQUENCY_HZ, ModulationPreset::Am650)
    }
}

impl fmt::Display for RadioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MHz {}", self.frequency_text(), self.preset)
    }
}
