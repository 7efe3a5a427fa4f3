//! Receive control of the sub-GHz transceiver

use tracing::{debug, info};

use super::settings::RadioSettings;

/// Bands the CC1101 can tune, in Hz
const SUPPORTED_BANDS: [(u32, u32); 3] = [
    (300_000_000, 348_000_000),
    (387_000_000, 464_000_000),
    (779_000_000, 928_000_000),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    #[error("frequency {0} Hz is outside the supported bands")]
    UnsupportedFrequency(u32),

    #[error("receiver must be stopped before reconfiguring")]
    Busy,

    #[error("radio device error: {0}")]
    Device(String),
}

/// Exclusively owned front-end.
///
/// Retuning is always sequenced stop → configure → start by the session,
/// never interleaved with decoding.
pub trait RadioFrontend {
    fn stop_rx(&mut self) -> Result<(), RadioError>;

    fn configure(&mut self, settings: &RadioSettings) -> Result<(), RadioError>;

    fn start_rx(&mut self) -> Result<(), RadioError>;

    fn is_receiving(&self) -> bool;
}

pub fn is_frequency_supported(frequency_hz: u32) -> bool {
    SUPPORTED_BANDS
        .iter()
        .any(|&(lo, hi)| (lo..=hi).contains(&frequency_hz))
}

/// Front-end used when edges come from a capture file: tracks state and
/// logs each transition.
#[derive(Debug, Default)]
pub struct LoggingFrontend {
    settings: Option<RadioSettings>,
    receiving: bool,
    retunes: u64,
}

impl LoggingFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> Option<RadioSettings> {
        self.settings
    }

    pub fn retunes(&self) -> u64 {
        self.retunes
    }
}

impl RadioFrontend for LoggingFrontend {
    fn stop_rx(&mut self) -> Result<(), RadioError> {
        if self.receiving {
            debug!("RX stopped");
        }
        self.receiving = false;
        Ok(())
    }

    fn configure(&mut self, settings: &RadioSettings) -> Result<(), RadioError> {
        if self.receiving {
            return Err(RadioError::Busy);
        }
        if !is_frequency_supported(settings.frequency_hz) {
            return Err(RadioError::UnsupportedFrequency(settings.frequency_hz));
        }
        self.settings = Some(*settings);
        self.retunes += 1;
        info!("Tuned to {}", settings);
        Ok(())
    }

    fn start_rx(&mut self) -> Result<(), RadioError> {
        if self.settings.is_none() {
            return Err(RadioError::Device("start_rx before configure".to_string()));
        }
        self.receiving = true;
        debug!("RX started");
        Ok(())
    }

    fn is_receiving(&self) -> bool {
        self.receiving
    }
}
